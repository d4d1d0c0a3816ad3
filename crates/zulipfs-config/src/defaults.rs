use crate::types::ZulipFsConfig;
use crate::zuliprc::Zuliprc;
use crate::ConfigError;

impl ZulipFsConfig {
    /// Apply default inference rules to the configuration in place.
    ///
    /// Credentials missing from the YAML are filled from `transport.zuliprc`
    /// when one is configured; values already present are never overwritten.
    pub fn apply_defaults(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = self.transport.zuliprc.clone() {
            let needs_rc = self.transport.site.is_none()
                || self.transport.email.is_none()
                || self.transport.api_key.is_none();
            if needs_rc {
                let rc = Zuliprc::from_file(&path)?;
                self.fill_from_zuliprc(rc);
            }
        }

        if let Some(site) = self.transport.site.as_mut() {
            let trimmed = site.trim().trim_end_matches('/').to_string();
            *site = trimmed;
        }

        Ok(())
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> Result<ZulipFsConfig, ConfigError> {
        let mut config = self.clone();
        config.apply_defaults()?;
        Ok(config)
    }

    fn fill_from_zuliprc(&mut self, rc: Zuliprc) {
        let transport = &mut self.transport;
        if transport.site.is_none() {
            transport.site = rc.site;
        }
        if transport.email.is_none() {
            transport.email = rc.email;
        }
        if transport.api_key.is_none() {
            transport.api_key = rc.key;
        }
    }
}
