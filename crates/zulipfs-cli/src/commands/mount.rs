//! Mount command for the zulipfs FUSE filesystem.

use std::path::PathBuf;

use zulipfs_config::ZulipFsConfig;
use zulipfs_fuse::ZulipFuse;

/// Mount arguments.
pub struct MountArgs {
    /// Mount point path.
    pub mountpoint: PathBuf,
    /// Let other users access the mount.
    pub allow_other: bool,
    /// Override for the filesystem name.
    pub fs_name: Option<String>,
}

/// Run the mount command. Blocks until the filesystem is unmounted.
pub fn run(config: ZulipFsConfig, args: MountArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.mountpoint.exists() {
        std::fs::create_dir_all(&args.mountpoint)?;
    }

    let config = apply_overrides(config, &args);
    let fs = ZulipFuse::from_config(&config)?;

    fs.mount(&args.mountpoint)?;

    Ok(())
}

fn apply_overrides(mut config: ZulipFsConfig, args: &MountArgs) -> ZulipFsConfig {
    if args.allow_other {
        config.mount.allow_other = true;
    }
    if let Some(name) = &args.fs_name {
        config.mount.fs_name = name.clone();
    }
    config
}
