mod defaults;
mod env;
pub mod types;
mod validation;
pub mod zuliprc;

use std::path::Path;

pub use env::expand_home;
pub use types::*;
pub use zuliprc::Zuliprc;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Missing credential '{0}'. Set transport.{0} or point transport.zuliprc at a zuliprc file.")]
    MissingCredential(&'static str),

    #[error("Invalid site URL '{0}': must start with http:// or https://")]
    InvalidSite(String),

    #[error("Invalid zuliprc: {0}")]
    Zuliprc(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ZulipFsConfig {
    /// Parse a configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;
        let config: ZulipFsConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Render the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
