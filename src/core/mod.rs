pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{AnalysisError, ApiError, ConfigError};
pub use types::{
    Action, AnalyzeResponse, DetectedFace, EmotionScores, FaceAnalysis, FaceRegion,
    GenderScores, MultiFaceResponse, RaceScores,
};
