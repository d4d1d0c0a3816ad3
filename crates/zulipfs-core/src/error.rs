/// Errors reported by a messaging transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} from {endpoint}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The server processed the request and rejected it.
    #[error("Server rejected request ({code}): {message}")]
    Api { code: String, message: String },

    /// The server could not be reached.
    #[error("Connection to messaging server failed: {0}")]
    Connection(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Other transport-specific error.
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Connection(_) => true,
            TransportError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors surfaced by filesystem operations.
///
/// Each variant corresponds to exactly one POSIX error code at the runtime
/// boundary.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FsError {
    /// Unknown channel, unknown topic, or a path with the wrong number of segments.
    #[error("Path not found: {0}")]
    NotFound(String),

    /// A directory operation was applied to a topic file.
    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    /// A file operation was applied to the root or a channel directory.
    #[error("Path is a directory: {0}")]
    NotAFile(String),

    /// Writes always carry one complete message body.
    #[error("Partial write at offset {offset} is not supported: {path}")]
    UnsupportedOffset { path: String, offset: u64 },

    /// Input that cannot be turned into a message (e.g. invalid UTF-8).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure reported by the messaging transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}
