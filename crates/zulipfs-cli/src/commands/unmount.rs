//! Unmount command for the zulipfs FUSE filesystem.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Unmount arguments.
pub struct UnmountArgs {
    /// Mount point path to unmount.
    pub mountpoint: PathBuf,
    /// Force unmount even if busy.
    pub force: bool,
}

/// Run the unmount command.
pub fn run(args: UnmountArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mountpoint = args
        .mountpoint
        .canonicalize()
        .unwrap_or_else(|_| args.mountpoint.clone());

    #[cfg(target_os = "macos")]
    {
        unmount_macos(&mountpoint, args.force)?;
    }

    #[cfg(target_os = "linux")]
    {
        unmount_linux(&mountpoint, args.force)?;
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        return Err("Unmount not supported on this platform".into());
    }

    println!("Unmounted {}", mountpoint.display());
    Ok(())
}

#[cfg(target_os = "macos")]
fn unmount_macos(mountpoint: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new("umount");
    if force {
        cmd.arg("-f");
    }
    cmd.arg(mountpoint);

    let output = cmd.output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("umount failed: {}", stderr.trim()).into());
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn unmount_linux(mountpoint: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new("fusermount");
    cmd.arg("-u");
    if force {
        cmd.arg("-z"); // lazy
    }
    cmd.arg(mountpoint);

    if let Ok(out) = cmd.output() {
        if out.status.success() {
            return Ok(());
        }
    }

    // fusermount missing or refused; try plain umount
    let mut cmd = Command::new("umount");
    if force {
        cmd.arg("-l");
    }
    cmd.arg(mountpoint);

    let output = cmd.output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("umount failed: {}", stderr.trim()).into());
    }

    Ok(())
}
