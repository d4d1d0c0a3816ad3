//! `fuser::Filesystem` glue: each callback forwards to `ZulipFsCore` and
//! turns its result into a kernel reply.

use std::ffi::OsStr;
use std::time::SystemTime;

use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use tracing::{debug, error};

use crate::async_bridge::FuseError;
use crate::common::{inode_attr_to_file_attr, ZulipFsCore};
use crate::inode::{InodeAttr, InodeKind};

/// Unix FUSE filesystem wrapper around `ZulipFsCore`.
pub struct UnixFuse(pub ZulipFsCore);

impl UnixFuse {
    fn error_to_errno(e: &FuseError) -> i32 {
        e.to_errno()
    }

    /// Topic files are opened with direct I/O: their size is only known
    /// once fetched, and the kernel must not cut reads short at a stale size.
    fn open_flags(kind: InodeKind) -> u32 {
        match kind {
            InodeKind::File => FOPEN_DIRECT_IO,
            InodeKind::Directory => 0,
        }
    }
}

const BLOCK_SIZE: u32 = 4096;
const NAME_MAX: u32 = 255;

fn file_type(kind: InodeKind) -> FileType {
    match kind {
        InodeKind::File => FileType::RegularFile,
        InodeKind::Directory => FileType::Directory,
    }
}

impl Filesystem for UnixFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name_str = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        debug!(parent, name = name_str, "lookup");

        match self.0.do_lookup(parent, name_str) {
            Ok(attr) => reply.entry(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr), 0),
            Err(e) => {
                debug!(parent, name = name_str, error = %e, "lookup miss");
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        debug!(ino, "getattr");

        match self.0.do_getattr(ino) {
            Ok(attr) => reply.attr(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr)),
            Err(e) => {
                debug!(ino, error = %e, "getattr miss");
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!(ino, offset, size, "read");

        match self.0.do_read(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                error!(ino, error = %e, "read reply failed");
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!(ino, offset, len = data.len(), "write");

        match self.0.do_write(ino, offset, data) {
            Ok(written) => reply.written(written),
            Err(e) => {
                error!(ino, error = %e, "write reply failed");
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!(ino, offset, "readdir");

        match self.0.do_readdir(ino) {
            Ok(result) => {
                let mut i = offset.max(0) as usize;

                if i == 0 {
                    if reply.add(result.ino, 1, FileType::Directory, ".") {
                        reply.ok();
                        return;
                    }
                    i += 1;
                }
                if i == 1 {
                    if reply.add(result.parent_ino, 2, FileType::Directory, "..") {
                        reply.ok();
                        return;
                    }
                    i += 1;
                }

                for entry in result.entries.into_iter().skip(i - 2) {
                    i += 1;
                    if reply.add(entry.ino, i as i64, file_type(entry.kind), &entry.name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => {
                error!(ino, error = %e, "readdir reply failed");
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!(ino, "open");

        match self.0.do_open(ino) {
            Ok(kind) => reply.opened(0, Self::open_flags(kind)),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!(ino, "opendir");

        match self.0.do_open(ino) {
            Ok(InodeKind::Directory) => reply.opened(0, 0),
            Ok(InodeKind::File) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let name_str = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        debug!(parent, name = name_str, "create");

        match self.0.do_create(parent, name_str) {
            Ok(attr) => reply.created(
                &InodeAttr::ttl(),
                &inode_attr_to_file_attr(&attr),
                0,
                0,
                Self::open_flags(InodeKind::File),
            ),
            Err(e) => {
                debug!(parent, name = name_str, error = %e, "create refused");
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!(ino, ?size, "setattr");

        match self.0.do_setattr(ino, size) {
            Ok(attr) => reply.attr(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr)),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: fuser::ReplyStatfs) {
        // Nothing is stored locally; report an empty volume.
        reply.statfs(0, 0, 0, 0, 0, BLOCK_SIZE, NAME_MAX, BLOCK_SIZE);
    }

    fn access(&mut self, _req: &Request, ino: u64, _mask: i32, reply: ReplyEmpty) {
        match self.0.do_access(ino) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }
}
