use crate::core::errors::ConfigError;
use std::env;
use std::path::PathBuf;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory containers are mapped under.
    pub root: PathBuf,
}

/// Object detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Gaussian blur sigma applied before thresholding.
    pub blur_sigma: f32,
    /// Side length of the adaptive-threshold window (odd, >= 3).
    pub threshold_window: u32,
    /// Constant subtracted from the local mean before comparison.
    pub threshold_offset: i32,
    /// Radius of the morphological closing (2 gives a 5x5 element).
    pub closing_radius: u8,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub detection: DetectionConfig,
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

        Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1430),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            storage: StorageConfig {
                root: env::var("STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("storage")),
            },
            detection: DetectionConfig {
                blur_sigma: env::var("BLUR_SIGMA")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1.1),
                threshold_window: env::var("THRESHOLD_WINDOW")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(11),
                threshold_offset: env::var("THRESHOLD_OFFSET")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                closing_radius: env::var("CLOSING_RADIUS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.threshold_window < 3 || self.detection.threshold_window % 2 == 0 {
            return Err(ConfigError::InvalidValue {
                name: "THRESHOLD_WINDOW",
                value: self.detection.threshold_window.to_string(),
                reason: "must be odd and at least 3",
            });
        }
        if !(self.detection.blur_sigma > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "BLUR_SIGMA",
                value: self.detection.blur_sigma.to_string(),
                reason: "must be positive",
            });
        }
        if self.detection.closing_radius == 0 {
            return Err(ConfigError::InvalidValue {
                name: "CLOSING_RADIUS",
                value: self.detection.closing_radius.to_string(),
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
