use crate::types::ZulipFsConfig;
use crate::ConfigError;

impl ZulipFsConfig {
    /// Validate the configuration and return a list of errors.
    ///
    /// Run this on the `effective()` config so zuliprc-supplied credentials
    /// are taken into account.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let transport = &self.transport;

        match transport.site.as_deref() {
            None | Some("") => errors.push(ConfigError::MissingCredential("site")),
            Some(site) => {
                if !(site.starts_with("http://") || site.starts_with("https://")) {
                    errors.push(ConfigError::InvalidSite(site.to_string()));
                }
            }
        }

        if transport.email.as_deref().map_or(true, str::is_empty) {
            errors.push(ConfigError::MissingCredential("email"));
        }
        if transport.api_key.as_deref().map_or(true, str::is_empty) {
            errors.push(ConfigError::MissingCredential("api_key"));
        }

        if transport.timeout.as_duration().is_zero() {
            errors.push(ConfigError::InvalidConfig(
                "transport.timeout must be greater than zero".to_string(),
            ));
        }

        if self.cache.topic_page_size == 0 {
            errors.push(ConfigError::InvalidConfig(
                "cache.topic_page_size must be greater than zero".to_string(),
            ));
        }

        if self.cache.channel_limit == Some(0) {
            errors.push(ConfigError::InvalidConfig(
                "cache.channel_limit must be greater than zero when set".to_string(),
            ));
        }

        if self.mount.fs_name.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "mount.fs_name must not be empty".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
