use std::env;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};

use crate::ConfigError;

/// Interpolate environment variables in a string.
/// Replaces `${VAR_NAME}` with the value of the environment variable; every
/// unset variable is reported at once.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

    let mut missing = Vec::new();
    let result = re.replace_all(input, |cap: &Captures<'_>| {
        let name = &cap[1];
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }

    Ok(result.into_owned())
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs_next::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
