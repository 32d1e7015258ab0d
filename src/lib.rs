// Library exports for the facial analysis service

pub mod api;
pub mod core;
pub mod middleware;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{AnalysisError, ApiError, ConfigError},
    types::{
        Action, AnalyzeResponse, DetectedFace, EmotionScores, FaceAnalysis, FaceRegion,
        GenderScores, MultiFaceResponse, RaceScores,
    },
};

pub use crate::api::{router, AppState};
pub use crate::services::{FacialAnalyzer, OnnxAnalysisService};
pub use crate::utils::Metrics;
