pub mod cat;
pub mod config;
pub mod ls;
#[cfg(feature = "fuse")]
pub mod mount;
pub mod post;
pub mod stat;
pub mod unmount;
pub mod validate;

use std::sync::Arc;

use tracing::debug;
use zulipfs_config::ZulipFsConfig;
use zulipfs_core::FilesystemAdapter;
use zulipfs_remote::ZulipHttpTransport;

/// Build an adapter over the HTTP transport for the one-shot commands.
pub async fn connect(config: &ZulipFsConfig) -> Result<FilesystemAdapter, Box<dyn std::error::Error>> {
    let config = config.effective()?;
    config.validate_or_err()?;

    let transport = ZulipHttpTransport::from_config(&config.transport)?;
    debug!(site = transport.site(), "connecting");
    let adapter = FilesystemAdapter::from_config(Arc::new(transport), &config).await?;
    Ok(adapter)
}
