//! FUSE runtime for zulipfs.
//!
//! Channels are mounted as directories and topics as files. The kernel's
//! inode-based callbacks are resolved to paths and forwarded to the
//! [`FilesystemAdapter`](zulipfs_core::FilesystemAdapter).
//!
//! - `common`: `ZulipFsCore`, the platform-neutral callback logic
//! - `unix_fuse`: `fuser::Filesystem` impl for macOS/Linux

mod async_bridge;
mod common;
mod inode;
#[cfg(unix)]
mod unix_fuse;

pub use async_bridge::{block_on, init_runtime, runtime, FuseError, FuseResult};
pub use common::{DirEntry, ReadDirResult, ZulipFsCore};
pub use inode::{InodeAttr, InodeKind, InodeTable, ROOT_INO};

/// The mountable filesystem.
pub type ZulipFuse = ZulipFsCore;
