pub mod analysis;
pub mod face;
pub mod onnx;

// Re-export commonly used services
pub use analysis::{FacialAnalyzer, OnnxAnalysisService};
pub use face::FaceDetector;
