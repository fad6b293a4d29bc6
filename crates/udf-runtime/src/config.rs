//! Runtime configuration (udf.toml)
//!
//! ```toml
//! [loader]
//! base_path = "/var/lib/udfs"
//! extension = "udfc"
//! verify = true
//!
//! [invoke]
//! max_call_depth = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file {}: {source}", .path.display())]
    IoError {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Namespace loader settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Invocation settings
    #[serde(default)]
    pub invoke: InvokeOptions,
}

/// Namespace loader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Directory holding one class file per type
    #[serde(default)]
    pub base_path: PathBuf,

    /// Class file extension, without the dot (default: "udfc")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Run the verifier on every class before defining it
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_extension() -> String {
    "udfc".to_string()
}

fn default_verify() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            extension: default_extension(),
            verify: default_verify(),
        }
    }
}

impl LoaderConfig {
    /// Default settings rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }
}

/// Invocation settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Maximum nesting of static calls inside one invocation
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_max_call_depth() -> usize {
    256
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            max_call_depth: default_max_call_depth(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.loader.extension;
        if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "extension must be a bare file extension, got '{}'",
                ext
            )));
        }

        if self.invoke.max_call_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_call_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.loader.extension, "udfc");
        assert!(config.loader.verify);
        assert_eq!(config.invoke.max_call_depth, 256);
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
[loader]
base_path = "/opt/udfs"
extension = "bin"
verify = false

[invoke]
max_call_depth = 16
"#;

        let config = RuntimeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.loader.base_path, PathBuf::from("/opt/udfs"));
        assert_eq!(config.loader.extension, "bin");
        assert!(!config.loader.verify);
        assert_eq!(config.invoke.max_call_depth, 16);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str("[loader]\nbase_path = \"udfs\"\n").unwrap();
        assert_eq!(config.loader.extension, "udfc");
        assert!(config.loader.verify);
    }

    #[test]
    fn test_invalid_values() {
        let result = RuntimeConfig::from_toml_str("[invoke]\nmax_call_depth = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = RuntimeConfig::from_toml_str("[loader]\nextension = \".udfc\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = RuntimeConfig::from_toml_str("[loader\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = RuntimeConfig::default();
        config.loader = LoaderConfig::new("/tmp/udfs");

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized = RuntimeConfig::from_toml_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_from_missing_file() {
        let result = RuntimeConfig::from_file(Path::new("/nonexistent/udf.toml"));
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
