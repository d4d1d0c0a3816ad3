//! Reader for the `zuliprc` credentials file.
//!
//! The file is INI-style; only the `[api]` section is consulted:
//!
//! ```text
//! [api]
//! email=bot@example.com
//! key=abcdef
//! site=https://chat.example.com
//! ```

use std::path::Path;

use crate::env::expand_home;
use crate::ConfigError;

/// Credentials read from a zuliprc file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zuliprc {
    pub email: Option<String>,
    pub key: Option<String>,
    pub site: Option<String>,
}

impl Zuliprc {
    /// Load and parse a zuliprc file; `~` is expanded.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Zuliprc(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse zuliprc content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut rc = Zuliprc::default();
        let mut in_api = false;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(section) = line.strip_prefix('[') {
                let name = section.strip_suffix(']').ok_or_else(|| {
                    ConfigError::Zuliprc(format!("line {}: unterminated section header", lineno + 1))
                })?;
                in_api = name.trim() == "api";
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .or_else(|| line.split_once(':'))
                .ok_or_else(|| {
                    ConfigError::Zuliprc(format!("line {}: expected key=value", lineno + 1))
                })?;

            if !in_api {
                continue;
            }

            let value = value.trim().to_string();
            match key.trim() {
                "email" => rc.email = Some(value),
                "key" => rc.key = Some(value),
                "site" => rc.site = Some(value),
                _ => {}
            }
        }

        Ok(rc)
    }
}
