//! Server configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use scanlink_core::frame::DEFAULT_MAX_MESSAGE_SIZE;
use scanlink_core::ScanOptions;
use scanlink_transport::BindOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Server settings, loadable from TOML
///
/// ```toml
/// host = "0.0.0.0"
/// port = 5555
/// backside_threshold_secs = 2.0
/// output_dir = "./scans"
///
/// [options]
/// mode = "Gray"
/// resolution = 200
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Pause between bind attempts while the port is in use
    pub bind_retry_ms: u64,

    /// Give up binding after this many attempts
    pub bind_max_attempts: Option<u32>,

    /// Feeds faster than this are backsides
    pub backside_threshold_secs: f64,

    /// Parent directory of per-session output
    pub output_dir: PathBuf,

    /// Close a connection that sends no command or page request for this long
    pub idle_timeout_secs: Option<u64>,

    pub max_message_size: usize,

    /// Defaults applied before the client's options
    pub options: Map<String, Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: scanlink_core::DEFAULT_PORT,
            bind_retry_ms: 1000,
            bind_max_attempts: None,
            backside_threshold_secs: 2.0,
            output_dir: PathBuf::from("./scans"),
            idle_timeout_secs: Some(300),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            options: Map::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bind_options(&self) -> BindOptions {
        BindOptions {
            retry_interval: Duration::from_millis(self.bind_retry_ms),
            max_attempts: self.bind_max_attempts,
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidSetting`] for negative, infinite or NaN values.
    pub fn backside_threshold(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.backside_threshold_secs).map_err(|e| Error::InvalidSetting {
            key: "backside_threshold_secs",
            reason: e.to_string(),
        })
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Scanner defaults with the configured overrides applied
    pub fn default_options(&self) -> Result<ScanOptions> {
        Ok(ScanOptions::default().merged(&self.options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scanlink_core::options::ColorMode;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5555");
        assert_eq!(config.backside_threshold().unwrap(), Duration::from_secs(2));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.bind_options().retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 6000
            backside_threshold_secs = 1.5

            [options]
            mode = "Gray"
            resolution = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.backside_threshold().unwrap(), Duration::from_millis(1500));

        let options = config.default_options().unwrap();
        assert_eq!(options.mode, ColorMode::Gray);
        assert_eq!(options.resolution, 200);
    }

    #[test]
    fn test_invalid_default_option() {
        let config = ServerConfig::from_toml("[options]\nresolution = 5000\n").unwrap();
        assert!(config.default_options().is_err());
    }

    #[test]
    fn test_unrepresentable_threshold() {
        for value in ["inf", "-1.0", "nan"] {
            let config =
                ServerConfig::from_toml(&format!("backside_threshold_secs = {}", value)).unwrap();
            assert!(matches!(
                config.backside_threshold(),
                Err(Error::InvalidSetting {
                    key: "backside_threshold_secs",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_bad_toml() {
        assert!(ServerConfig::from_toml("port = \"x\"").is_err());
    }
}
