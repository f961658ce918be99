//! YAML configuration file support for wavedb.
//!
//! Deployments describe the database file, server bind point, and query
//! defaults in a single YAML document loaded at startup.
//!
//! ## Example YAML configuration
//!
//! ```yaml
//! # wavedb configuration
//! version: "1.0"
//! name: "photo-dedup"
//!
//! database:
//!   path: "/var/lib/wavedb/images.wsdb"
//!   save_on_shutdown: true
//!
//! server:
//!   bind_addr: "127.0.0.1"
//!   port: 9548
//!
//! query:
//!   limit: 10
//!   min_score: -50.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WavedbConfig {
    /// Configuration format version.
    pub version: String,

    /// Optional configuration name/description.
    #[serde(default)]
    pub name: Option<String>,

    /// Database persistence settings.
    #[serde(default)]
    pub database: DatabaseYamlConfig,

    /// Server bind settings.
    #[serde(default)]
    pub server: ServerYamlConfig,

    /// Query defaults.
    #[serde(default)]
    pub query: QueryYamlConfig,
}

impl WavedbConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: WavedbConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.server.validate()?;
        self.query.validate()?;
        Ok(())
    }
}

impl Default for WavedbConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            database: DatabaseYamlConfig::default(),
            server: ServerYamlConfig::default(),
            query: QueryYamlConfig::default(),
        }
    }
}

/// Database persistence section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseYamlConfig {
    /// Signature file path. `None` runs fully in memory.
    #[serde(default)]
    pub path: Option<String>,

    /// Flush pending changes when the process shuts down.
    #[serde(default = "true_value")]
    pub save_on_shutdown: bool,
}

impl Default for DatabaseYamlConfig {
    fn default() -> Self {
        Self {
            path: None,
            save_on_shutdown: true,
        }
    }
}

/// Server bind section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerYamlConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "server.bind_addr must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigLoadError::Validation(
                "server.port must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

/// Query defaults section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryYamlConfig {
    /// Default number of hits returned when the caller does not say.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Optional default score floor.
    #[serde(default)]
    pub min_score: Option<f64>,
}

impl QueryYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.limit == 0 {
            return Err(ConfigLoadError::Validation(
                "query.limit must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueryYamlConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            min_score: None,
        }
    }
}

// Helper functions for serde defaults
fn true_value() -> bool {
    true
}
fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9548
}
fn default_limit() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
database:
  path: "/tmp/images.wsdb"
server:
  port: 9548
"#;

        let config = WavedbConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.database.path.as_deref(), Some("/tmp/images.wsdb"));
        assert_eq!(config.server.port, 9548);
    }

    #[test]
    fn load_from_file() {
        let yaml = r#"
version: "1.0"
query:
  limit: 3
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = WavedbConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.query.limit, 3);
    }

    #[test]
    fn defaults_match_harness_contract() {
        let config = WavedbConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1");
        assert_eq!(config.server.port, 9548);
        assert_eq!(config.query.limit, 10);
        assert!(config.database.save_on_shutdown);
    }

    #[test]
    fn unsupported_version_rejected() {
        let result = WavedbConfig::from_yaml("version: \"7.3\"\n");
        assert!(matches!(
            result,
            Err(ConfigLoadError::UnsupportedVersion(v)) if v == "7.3"
        ));
    }

    #[test]
    fn zero_query_limit_rejected() {
        let yaml = r#"
version: "1.0"
query:
  limit: 0
"#;
        let result = WavedbConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("limit"));
    }

    #[test]
    fn zero_port_rejected() {
        let yaml = r#"
version: "1.0"
server:
  port: 0
"#;
        let result = WavedbConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("port"));
    }
}
