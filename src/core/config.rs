use crate::core::errors::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    /// Maximum request body size in MiB (applies to uploads)
    pub max_upload_mb: usize,
}

/// Storage configuration: where images live and where the CSV is kept
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub csv_path: PathBuf,
    /// Fail startup on the first malformed CSV row instead of skipping it
    pub strict_csv_load: bool,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn new() -> ConfigResult<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> ConfigResult<Self> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
                max_upload_mb: env::var("MAX_UPLOAD_MB")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(200),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("static/uploads")),
                csv_path: env::var("GCP_CSV_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("gcps.csv")),
                strict_csv_load: env::var("CSV_STRICT_LOAD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
            },
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "port must be > 0".to_string(),
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "host must not be empty".to_string(),
            ));
        }

        if !(1..=2048).contains(&self.server.max_upload_mb) {
            return Err(ConfigError::InvalidUploadLimit(self.server.max_upload_mb));
        }

        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidStorageConfig(
                "upload_dir must not be empty".to_string(),
            ));
        }

        if self.storage.csv_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidCsvPath("path must not be empty".to_string()));
        }

        // The CSV file itself may be missing, its directory may not
        if let Some(parent) = self.storage.csv_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidCsvPath(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb * 1024 * 1024
    }

    pub fn upload_dir(&self) -> &Path {
        &self.storage.upload_dir
    }

    pub fn csv_path(&self) -> &Path {
        &self.storage.csv_path
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server: ServerConfig {
                port: 5000,
                host: "127.0.0.1".to_string(),
                log_level: Level::INFO,
                max_upload_mb: 200,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("static/uploads"),
                csv_path: PathBuf::from("gcps.csv"),
                strict_csv_load: false,
            },
        }
    }

    #[test]
    fn test_defaults_validate() {
        let checked: ConfigResult<()> = sample().validate();
        assert!(checked.is_ok());
        assert_eq!(sample().max_upload_bytes(), 200 * 1024 * 1024);
    }

    #[test]
    fn test_rejects_zero_port_and_limit() {
        let mut config = sample();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidServerConfig(_))
        ));

        let mut config = sample();
        config.server.max_upload_mb = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUploadLimit(0))
        ));
    }

    #[test]
    fn test_rejects_csv_in_missing_directory() {
        let mut config = sample();
        config.storage.csv_path = PathBuf::from("/definitely/not/a/dir/gcps.csv");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCsvPath(_))));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("WARNING"), Some(Level::WARN));
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("loud"), None);
    }
}
