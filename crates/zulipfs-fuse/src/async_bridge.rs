//! Bridge between synchronous FUSE callbacks and the async adapter.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};
use zulipfs_core::FsError;

/// Runtime shared by every FUSE callback thread. A failed build is kept as
/// its error string and reported on each later access.
static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();

/// Build the shared runtime on first call; later calls return the same one.
pub fn init_runtime() -> Result<&'static Runtime, FuseError> {
    let result = RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .worker_threads(4)
            .thread_name("zulipfs-fuse-worker")
            .enable_all()
            .build()
            .map_err(|e| e.to_string())
    });
    match result {
        Ok(rt) => Ok(rt),
        Err(e) => Err(FuseError::Other(format!(
            "could not build the zulipfs runtime: {}",
            e
        ))),
    }
}

/// The shared runtime, or an error if `init_runtime` has not succeeded.
pub fn runtime() -> Result<&'static Runtime, FuseError> {
    match RUNTIME.get() {
        Some(Ok(rt)) => Ok(rt),
        Some(Err(e)) => Err(FuseError::Other(format!(
            "zulipfs runtime unavailable: {}",
            e
        ))),
        None => Err(FuseError::Other(
            "zulipfs runtime not started (init_runtime was never called)".to_string(),
        )),
    }
}

/// Drive an adapter future to completion from a kernel callback thread.
///
/// Must not be called from inside the runtime itself.
pub fn block_on<F, T>(future: F) -> Result<T, FuseError>
where
    F: Future<Output = T>,
{
    let rt = runtime()?;
    Ok(rt.block_on(future))
}

pub type FuseResult<T> = Result<T, FuseError>;

/// Errors returned to the kernel, one errno each.
#[derive(Debug, thiserror::Error)]
pub enum FuseError {
    /// No such channel, topic, or inode.
    #[error("not found")]
    NotFound,
    /// A channel directory was used as a topic file.
    #[error("is a directory")]
    IsDir,
    /// A topic file was used as a directory.
    #[error("not a directory")]
    NotDir,
    /// Bad name encoding, negative or nonzero write offset, non-UTF-8 body.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    /// Operation the hierarchy does not support, such as creating a channel.
    #[error("operation not supported: {0}")]
    Unsupported(String),
    /// The messaging server failed the request.
    #[error("remote error: {0}")]
    Remote(String),
    /// Other error.
    #[error("{0}")]
    Other(String),
}

#[cfg(unix)]
impl FuseError {
    /// errno handed back to the kernel.
    pub fn to_errno(&self) -> i32 {
        match self {
            FuseError::NotFound => libc::ENOENT,
            FuseError::IsDir => libc::EISDIR,
            FuseError::NotDir => libc::ENOTDIR,
            FuseError::InvalidArg(_) => libc::EINVAL,
            FuseError::Unsupported(_) => libc::ENOTSUP,
            FuseError::Remote(_) => libc::EIO,
            FuseError::Other(_) => libc::EIO,
        }
    }
}

impl From<FsError> for FuseError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(_) => FuseError::NotFound,
            FsError::NotADirectory(_) => FuseError::NotDir,
            FsError::NotAFile(_) => FuseError::IsDir,
            FsError::UnsupportedOffset { .. } | FsError::InvalidInput(_) => {
                FuseError::InvalidArg(e.to_string())
            }
            FsError::Transport(t) => FuseError::Remote(t.to_string()),
            _ => FuseError::Other(e.to_string()),
        }
    }
}
