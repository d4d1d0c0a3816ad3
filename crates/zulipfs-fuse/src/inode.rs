//! Inode management for the FUSE filesystem.
//!
//! Inode numbers are stable for the life of the mount; channels and topics
//! are never removed, so neither are their inodes.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use zulipfs_core::{Attributes, NodeKind, DIRECTORY_SIZE};

/// Reserved inode for the root directory.
pub const ROOT_INO: u64 = 1;

/// Inode attributes matching FUSE requirements.
#[derive(Debug, Clone)]
pub struct InodeAttr {
    pub ino: u64,
    pub size: u64,
    /// Number of 512-byte blocks.
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
    pub kind: InodeKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Directory,
}

impl From<NodeKind> for InodeKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Directory => InodeKind::Directory,
            NodeKind::File => InodeKind::File,
        }
    }
}

impl InodeAttr {
    /// Placeholder attributes for a directory.
    pub fn directory(ino: u64) -> Self {
        Self::build(ino, InodeKind::Directory, DIRECTORY_SIZE, 0o755, SystemTime::now())
    }

    /// Placeholder attributes for a topic file whose content is unknown.
    pub fn file(ino: u64, size: u64) -> Self {
        Self::build(ino, InodeKind::File, size, 0o644, SystemTime::now())
    }

    /// Attributes reported by the filesystem adapter.
    pub fn from_attributes(ino: u64, attrs: &Attributes) -> Self {
        Self::build(ino, attrs.kind.into(), attrs.size, attrs.perm, attrs.modified)
    }

    fn build(ino: u64, kind: InodeKind, size: u64, perm: u16, time: SystemTime) -> Self {
        let (uid, gid) = owner();
        InodeAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: time,
            mtime: time,
            ctime: time,
            crtime: time,
            kind,
            perm,
            nlink: if kind == InodeKind::Directory { 2 } else { 1 },
            uid,
            gid,
        }
    }

    /// Default TTL for attributes.
    pub fn ttl() -> Duration {
        Duration::from_secs(1)
    }
}

/// Everything is owned by the mounting user.
#[cfg(unix)]
fn owner() -> (u32, u32) {
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(not(unix))]
fn owner() -> (u32, u32) {
    (0, 0)
}

/// Inode table managing path-to-inode and inode-to-path mappings.
pub struct InodeTable {
    path_to_ino: RwLock<HashMap<String, u64>>,
    ino_to_path: RwLock<HashMap<u64, String>>,
    /// Last attributes reported for each inode.
    attrs: RwLock<HashMap<u64, InodeAttr>>,
    next_ino: RwLock<u64>,
}

impl InodeTable {
    /// Create a new inode table with root directory initialized.
    pub fn new() -> Self {
        let table = InodeTable {
            path_to_ino: RwLock::new(HashMap::new()),
            ino_to_path: RwLock::new(HashMap::new()),
            attrs: RwLock::new(HashMap::new()),
            next_ino: RwLock::new(ROOT_INO + 1),
        };

        {
            let mut path_to_ino = table.path_to_ino.write();
            let mut ino_to_path = table.ino_to_path.write();
            let mut attrs = table.attrs.write();

            path_to_ino.insert("/".to_string(), ROOT_INO);
            ino_to_path.insert(ROOT_INO, "/".to_string());
            attrs.insert(ROOT_INO, InodeAttr::directory(ROOT_INO));
        }

        table
    }

    /// Get or allocate the inode for a path. New inodes get placeholder
    /// attributes of the given kind.
    pub fn get_or_create(&self, path: &str, kind: InodeKind) -> u64 {
        let normalized = Self::normalize_path(path);

        if let Some(&ino) = self.path_to_ino.read().get(&normalized) {
            return ino;
        }

        let mut path_to_ino = self.path_to_ino.write();
        // Another thread may have won the race between the two locks.
        if let Some(&ino) = path_to_ino.get(&normalized) {
            return ino;
        }

        let ino = {
            let mut next = self.next_ino.write();
            let ino = *next;
            *next += 1;
            ino
        };

        let attr = match kind {
            InodeKind::Directory => InodeAttr::directory(ino),
            InodeKind::File => InodeAttr::file(ino, 0),
        };
        self.ino_to_path.write().insert(ino, normalized.clone());
        self.attrs.write().insert(ino, attr);
        path_to_ino.insert(normalized, ino);

        ino
    }

    pub fn get_ino(&self, path: &str) -> Option<u64> {
        let normalized = Self::normalize_path(path);
        self.path_to_ino.read().get(&normalized).copied()
    }

    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.ino_to_path.read().get(&ino).cloned()
    }

    pub fn get_attr(&self, ino: u64) -> Option<InodeAttr> {
        self.attrs.read().get(&ino).cloned()
    }

    /// Record fresh attributes for an inode.
    pub fn set_attr(&self, attr: InodeAttr) {
        self.attrs.write().insert(attr.ino, attr);
    }

    /// Number of allocated inodes, including the root.
    pub fn len(&self) -> usize {
        self.ino_to_path.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn normalize_path(path: &str) -> String {
        let mut normalized = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }

        normalized
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
