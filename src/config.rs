use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamflowConfig {
    pub camera: CameraConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Platform device identifier (the primary rear camera is "0")
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Number of pre-allocated frame slots in the buffer pool
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Display hint (width, height) used for preview size negotiation
    #[serde(default = "default_display_hint")]
    pub display_hint: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on the open/configure/start sequence, in milliseconds.
    /// `None` leaves initialization unbounded.
    pub initialize_timeout_ms: Option<u64>,

    /// Interval between simulated frames when running against the mock
    /// backend, in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl CamflowConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camflow.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.device_id", default_device_id())?
            .set_default("camera.pool_capacity", default_pool_capacity() as u64)?
            .set_default(
                "camera.display_hint",
                vec![default_display_hint().0, default_display_hint().1],
            )?
            .set_default("runtime.frame_interval_ms", default_frame_interval_ms())?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("camflow.toml")).required(false))
            .add_source(Environment::with_prefix("CAMFLOW").separator("_"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.device_id.is_empty() {
            return Err(ConfigError::Message(
                "camera.device_id must not be empty".to_string(),
            ));
        }

        if self.camera.pool_capacity == 0 {
            return Err(ConfigError::Message(
                "camera.pool_capacity must be at least 1".to_string(),
            ));
        }

        let (width, height) = self.camera.display_hint;
        if width == 0 || height == 0 {
            return Err(ConfigError::Message(
                "camera.display_hint dimensions must be positive".to_string(),
            ));
        }

        if let Some(timeout_ms) = self.runtime.initialize_timeout_ms {
            if timeout_ms == 0 {
                return Err(ConfigError::Message(
                    "runtime.initialize_timeout_ms must be positive when set".to_string(),
                ));
            }
        }

        if self.runtime.frame_interval_ms == 0 {
            return Err(ConfigError::Message(
                "runtime.frame_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CamflowConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device_id: default_device_id(),
                pool_capacity: default_pool_capacity(),
                display_hint: default_display_hint(),
            },
            runtime: RuntimeConfig {
                initialize_timeout_ms: None,
                frame_interval_ms: default_frame_interval_ms(),
            },
        }
    }
}

fn default_device_id() -> String {
    "0".to_string()
}

fn default_pool_capacity() -> usize {
    3
}

fn default_display_hint() -> (u32, u32) {
    (1440, 1080)
}

fn default_frame_interval_ms() -> u64 {
    33
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = CamflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.device_id, "0");
        assert_eq!(config.camera.pool_capacity, 3);
        assert_eq!(config.camera.display_hint, (1440, 1080));
        assert!(config.runtime.initialize_timeout_ms.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = CamflowConfig::load_from_file("/nonexistent/camflow.toml").unwrap();
        assert_eq!(config.camera.pool_capacity, 3);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("camflow.toml");
        std::fs::write(
            &path,
            "[camera]\npool_capacity = 5\ndisplay_hint = [1920, 1080]\n\n\
             [runtime]\ninitialize_timeout_ms = 5000\n",
        )
        .unwrap();

        let config = CamflowConfig::load_from_file(&path).unwrap();
        assert_eq!(config.camera.pool_capacity, 5);
        assert_eq!(config.camera.display_hint, (1920, 1080));
        assert_eq!(config.runtime.initialize_timeout_ms, Some(5000));
        // Untouched fields keep defaults
        assert_eq!(config.camera.device_id, "0");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CamflowConfig::default();
        config.camera.pool_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = CamflowConfig::default();
        config.camera.display_hint = (0, 1080);
        assert!(config.validate().is_err());

        let mut config = CamflowConfig::default();
        config.runtime.initialize_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }
}
