use std::path::Path;

use zulipfs_config::ZulipFsConfig;

const MASK: &str = "********";

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ZulipFsConfig::from_file(config_path)?.effective()?;
    print!("{}", masked(config).to_yaml()?);
    Ok(())
}

/// Hide the API key before the config is shown.
fn masked(mut config: ZulipFsConfig) -> ZulipFsConfig {
    if let Some(key) = config.transport.api_key.as_mut() {
        if !key.is_empty() {
            *key = MASK.to_string();
        }
    }
    config
}
