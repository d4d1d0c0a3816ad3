//! Platform-neutral FUSE core logic.
//!
//! Translates inode-based callbacks into path-based adapter calls.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use zulipfs_config::{MountConfig, ZulipFsConfig};
use zulipfs_core::{FilesystemAdapter, FsPath, MessagingTransport};
use zulipfs_remote::ZulipHttpTransport;

use crate::async_bridge::{block_on, init_runtime, FuseError, FuseResult};
use crate::inode::{InodeAttr, InodeKind, InodeTable, ROOT_INO};

/// Core FUSE filesystem logic, platform-independent.
pub struct ZulipFsCore {
    pub adapter: Arc<FilesystemAdapter>,
    pub inodes: Arc<InodeTable>,
    pub mount_options: MountConfig,
}

impl ZulipFsCore {
    /// Build a core talking to the configured server.
    pub fn from_config(config: &ZulipFsConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config.effective()?;
        config.validate_or_err()?;

        let transport = ZulipHttpTransport::from_config(&config.transport)?;
        Ok(Self::with_transport(Arc::new(transport), &config)?)
    }

    /// Build a core over any transport. Loads the channel listing.
    pub fn with_transport(
        transport: Arc<dyn MessagingTransport>,
        config: &ZulipFsConfig,
    ) -> FuseResult<Self> {
        init_runtime()?;

        let adapter = block_on(FilesystemAdapter::from_config(transport, config))?
            .map_err(|e| FuseError::Remote(e.to_string()))?;

        Ok(ZulipFsCore {
            adapter: Arc::new(adapter),
            inodes: Arc::new(InodeTable::new()),
            mount_options: config.mount.clone(),
        })
    }

    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.inodes.get_path(ino)
    }

    /// Resolve a child path from parent + name.
    pub fn child_path(parent_path: &str, name: &str) -> String {
        if parent_path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_path, name)
        }
    }

    fn path_of(&self, ino: u64) -> FuseResult<String> {
        self.get_path(ino).ok_or(FuseError::NotFound)
    }

    /// Fetch attributes from the adapter and record them on the inode.
    fn refresh(&self, path: &str) -> FuseResult<InodeAttr> {
        let adapter = self.adapter.clone();
        let attrs = block_on(async { adapter.attributes(path).await })??;
        let ino = self.inodes.get_or_create(path, attrs.kind.into());
        let attr = InodeAttr::from_attributes(ino, &attrs);
        self.inodes.set_attr(attr.clone());
        Ok(attr)
    }

    /// Perform a lookup operation.
    pub fn do_lookup(&self, parent: u64, name: &str) -> FuseResult<InodeAttr> {
        let parent_path = self.path_of(parent)?;
        let child_path = Self::child_path(&parent_path, name);
        self.refresh(&child_path)
    }

    /// Perform a getattr operation.
    pub fn do_getattr(&self, ino: u64) -> FuseResult<InodeAttr> {
        if ino == ROOT_INO {
            return Ok(InodeAttr::directory(ROOT_INO));
        }
        let path = self.path_of(ino)?;
        match self.refresh(&path) {
            // A file created but not yet posted to keeps its placeholder.
            Err(FuseError::NotFound) => self
                .inodes
                .get_attr(ino)
                .filter(|attr| attr.kind == InodeKind::File)
                .ok_or(FuseError::NotFound),
            other => other,
        }
    }

    /// Create a topic file in a channel directory. Nothing is sent until the
    /// first write; an existing topic is returned as is.
    pub fn do_create(&self, parent: u64, name: &str) -> FuseResult<InodeAttr> {
        let parent_path = self.path_of(parent)?;
        let child_path = Self::child_path(&parent_path, name);

        match FsPath::parse(&child_path) {
            FsPath::Topic(channel, _) if self.adapter.hierarchy().channel_exists(channel) => {}
            FsPath::Topic(..) => return Err(FuseError::NotFound),
            FsPath::Channel(_) => {
                return Err(FuseError::Unsupported(format!(
                    "cannot create channel {}",
                    child_path
                )))
            }
            FsPath::Root | FsPath::Malformed => {
                return Err(FuseError::InvalidArg(child_path));
            }
        }

        match self.refresh(&child_path) {
            Err(FuseError::NotFound) => {
                let ino = self.inodes.get_or_create(&child_path, InodeKind::File);
                let attr = InodeAttr::file(ino, 0);
                self.inodes.set_attr(attr.clone());
                debug!("created placeholder topic file {}", child_path);
                Ok(attr)
            }
            other => other,
        }
    }

    /// List a directory. `.` and `..` are left to the caller.
    pub fn do_readdir(&self, ino: u64) -> FuseResult<ReadDirResult> {
        let path = self.path_of(ino)?;
        let adapter = self.adapter.clone();
        let names = block_on(async { adapter.list(&path).await })??;

        let child_kind = match FsPath::parse(&path) {
            FsPath::Root => InodeKind::Directory,
            _ => InodeKind::File,
        };
        let entries = names
            .into_iter()
            .filter(|name| name != "." && name != "..")
            .map(|name| {
                let entry_ino = self
                    .inodes
                    .get_or_create(&Self::child_path(&path, &name), child_kind);
                DirEntry {
                    ino: entry_ino,
                    name,
                    kind: child_kind,
                }
            })
            .collect();

        Ok(ReadDirResult {
            ino,
            parent_ino: ROOT_INO,
            entries,
        })
    }

    /// Perform a read operation.
    pub fn do_read(&self, ino: u64, offset: i64, size: u32) -> FuseResult<Vec<u8>> {
        let path = self.path_of(ino)?;
        let offset = u64::try_from(offset)
            .map_err(|_| FuseError::InvalidArg(format!("negative offset {}", offset)))?;

        let adapter = self.adapter.clone();
        let data = block_on(async { adapter.read(&path, size as usize, offset).await })??;
        Ok(data)
    }

    /// Post the written buffer as one message.
    pub fn do_write(&self, ino: u64, offset: i64, data: &[u8]) -> FuseResult<u32> {
        let path = self.path_of(ino)?;
        let offset = u64::try_from(offset)
            .map_err(|_| FuseError::InvalidArg(format!("negative offset {}", offset)))?;

        let adapter = self.adapter.clone();
        let written = block_on(async { adapter.write(&path, data, offset).await })??;
        debug!("posted {} bytes to {}", written, path);
        u32::try_from(written).map_err(|_| FuseError::InvalidArg("write too large".to_string()))
    }

    /// Check that an inode may be opened and return its kind.
    pub fn do_open(&self, ino: u64) -> FuseResult<InodeKind> {
        self.path_of(ino)?;
        self.inodes
            .get_attr(ino)
            .map(|attr| attr.kind)
            .ok_or(FuseError::NotFound)
    }

    /// Check if an inode exists.
    pub fn do_access(&self, ino: u64) -> FuseResult<()> {
        self.path_of(ino).map(|_| ())
    }

    /// Handle setattr. Truncation is accepted and ignored: topic content
    /// only changes through the server, and `> file` truncates before writing.
    pub fn do_setattr(&self, ino: u64, size: Option<u64>) -> FuseResult<InodeAttr> {
        self.path_of(ino)?;
        let attr = self.inodes.get_attr(ino).ok_or(FuseError::NotFound)?;
        if size.is_some() && attr.kind == InodeKind::Directory {
            return Err(FuseError::IsDir);
        }
        Ok(attr)
    }

    /// Mount the filesystem. Blocks until it is unmounted.
    #[cfg(unix)]
    pub fn mount(self, mountpoint: &Path) -> Result<(), Box<dyn std::error::Error>> {
        use crate::unix_fuse::UnixFuse;

        let options = mount_options(&self.mount_options);
        info!("Mounting zulipfs at {:?}", mountpoint);
        fuser::mount2(UnixFuse(self), mountpoint, &options)?;
        info!("zulipfs unmounted from {:?}", mountpoint);

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn mount(self, _mountpoint: &Path) -> Result<(), Box<dyn std::error::Error>> {
        Err("FUSE mounting is only supported on Unix".into())
    }
}

#[cfg(unix)]
pub(crate) fn mount_options(config: &MountConfig) -> Vec<fuser::MountOption> {
    use fuser::MountOption;

    let mut options = vec![
        MountOption::FSName(config.fs_name.clone()),
        MountOption::DefaultPermissions,
        MountOption::NoExec,
    ];
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Result from a readdir operation.
pub struct ReadDirResult {
    /// Inode of the directory being listed.
    pub ino: u64,
    /// Inode of the parent directory. Every directory's parent is the root.
    pub parent_ino: u64,
    pub entries: Vec<DirEntry>,
}

/// A single directory entry.
pub struct DirEntry {
    pub ino: u64,
    pub name: String,
    pub kind: InodeKind,
}

/// Convert an `InodeAttr` to the `fuser` representation.
#[cfg(unix)]
pub fn inode_attr_to_file_attr(attr: &InodeAttr) -> fuser::FileAttr {
    use fuser::{FileAttr, FileType};

    let kind = match attr.kind {
        InodeKind::File => FileType::RegularFile,
        InodeKind::Directory => FileType::Directory,
    };

    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.crtime,
        kind,
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}
