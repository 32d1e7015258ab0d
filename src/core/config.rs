use crate::core::errors::ConfigError;
use crate::core::types;
use std::env;
use tracing::Level;

/// Runtime environment, selects how much error detail leaves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: Level,
    pub env: AppEnv,
}

/// Access gate configuration. `api_key: None` disables the gate entirely.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

/// Face detector configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub min_face_size: u32,
    pub model_path: String,
    pub inference_backend: Option<String>,
}

/// Attribute head configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub emotion_model_path: String,
    pub age_model_path: String,
    pub gender_model_path: String,
    pub race_model_path: String,
    pub default_detector: String,
    pub onnx_pool_size: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub detection: DetectionConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        // APP_ENV with FLASK_ENV as the legacy fallback, matching the upstream caller
        let app_env = env::var("APP_ENV")
            .or_else(|_| env::var("FLASK_ENV"))
            .map(|s| s.to_lowercase())
            .ok();
        let app_env = match app_env.as_deref() {
            Some("development") => AppEnv::Development,
            _ => AppEnv::Production,
        };

        let api_key = env::var("PYTHON_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
                log_level,
                env: app_env,
            },
            auth: AuthConfig { api_key },
            detection: DetectionConfig {
                confidence_threshold: env::var("CONFIDENCE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.7),
                iou_threshold: env::var("IOU_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.4),
                min_face_size: env::var("MIN_FACE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
                model_path: env::var("FACE_MODEL_PATH")
                    .unwrap_or_else(|_| "models/face_detector.onnx".to_string()),
                inference_backend: env::var("INFERENCE_BACKEND")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            },
            analysis: AnalysisConfig {
                emotion_model_path: env::var("EMOTION_MODEL_PATH")
                    .unwrap_or_else(|_| "models/emotion.onnx".to_string()),
                age_model_path: env::var("AGE_MODEL_PATH")
                    .unwrap_or_else(|_| "models/age.onnx".to_string()),
                gender_model_path: env::var("GENDER_MODEL_PATH")
                    .unwrap_or_else(|_| "models/gender.onnx".to_string()),
                race_model_path: env::var("RACE_MODEL_PATH")
                    .unwrap_or_else(|_| "models/race.onnx".to_string()),
                default_detector: env::var("DEFAULT_DETECTOR")
                    .map(|s| s.trim().to_lowercase())
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| types::DEFAULT_DETECTOR.to_string()),
                onnx_pool_size: env::var("ONNX_POOL_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| std::cmp::max(num_cpus::get() / 4, 1)),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.detection.confidence_threshold,
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(ConfigError::InvalidIoUThreshold(
                self.detection.iou_threshold,
            ));
        }

        if self.detection.min_face_size == 0 {
            return Err(ConfigError::InvalidMinFaceSize);
        }

        if self.analysis.onnx_pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }

        if !types::is_supported_detector(&self.analysis.default_detector) {
            return Err(ConfigError::UnknownDetector(
                self.analysis.default_detector.clone(),
            ));
        }

        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.server.host
    }

    pub fn port(&self) -> u16 {
        self.server.port
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    /// Development builds surface exception detail in response bodies
    pub fn debug_errors(&self) -> bool {
        self.server.env == AppEnv::Development
    }

    pub fn api_key(&self) -> Option<&str> {
        self.auth.api_key.as_deref()
    }

    pub fn default_detector(&self) -> &str {
        &self.analysis.default_detector
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                log_level: Level::INFO,
                env: AppEnv::Production,
            },
            auth: AuthConfig { api_key: None },
            detection: DetectionConfig {
                confidence_threshold: 0.7,
                iou_threshold: 0.4,
                min_face_size: 30,
                model_path: "models/face_detector.onnx".to_string(),
                inference_backend: None,
            },
            analysis: AnalysisConfig {
                emotion_model_path: "models/emotion.onnx".to_string(),
                age_model_path: "models/age.onnx".to_string(),
                gender_model_path: "models/gender.onnx".to_string(),
                race_model_path: "models/race.onnx".to_string(),
                default_detector: "opencv".to_string(),
                onnx_pool_size: 1,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_bad_confidence_threshold_rejected() {
        let mut config = base_config();
        config.detection.confidence_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfidenceThreshold(_))
        ));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = base_config();
        config.analysis.onnx_pool_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPoolSize)));
    }

    #[test]
    fn test_unknown_default_detector_rejected() {
        let mut config = base_config();
        config.analysis.default_detector = "facenet".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownDetector(_))
        ));
    }

    #[test]
    fn test_debug_errors_follows_env() {
        let mut config = base_config();
        assert!(!config.debug_errors());
        config.server.env = AppEnv::Development;
        assert!(config.debug_errors());
    }
}
