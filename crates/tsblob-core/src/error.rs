//! Error taxonomy shared by the block model, the engine and the volumes.

use crate::checksum::Sha256Digest;
use crate::z85::Z85Error;

/// Coarse class of a transfer failure, recorded on each block outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fewer bytes read or written than the block's byte range demands.
    ShortIo,
    /// Recomputed digest differs from the stored one.
    ChecksumMismatch,
    /// The upload/download capability itself failed.
    Backend,
    /// Local I/O failure on the source or destination.
    Io,
    /// Caller supplied invalid input (empty block list, zero block size, ...).
    Precondition,
}

/// Failure of a block or file transfer operation.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: u64, actual: u64 },

    #[error(
        "checksum mismatch: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    ChecksumMismatch {
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("precondition violated: {0}")]
    Precondition(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::ShortRead { .. } | TransferError::ShortWrite { .. } => ErrorKind::ShortIo,
            TransferError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            TransferError::Backend(_) => ErrorKind::Backend,
            TransferError::Io(_) => ErrorKind::Io,
            TransferError::Precondition(_) => ErrorKind::Precondition,
        }
    }
}

/// Failure reported by a block store (upload, download or listing).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("http: {0}")]
    Http(#[from] curl::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected HTTP status {code}: {body}")]
    Status { code: u32, body: String },

    #[error("query failed: {0}")]
    Query(String),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed series key {key:?}: {reason}")]
    Parse { key: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{path} has {} stored versions ({}); select one by sha256", .candidates.len(), join(.candidates))]
    AmbiguousVersions {
        path: String,
        candidates: Vec<String>,
    },

    #[error("invalid path {0:?}: must be non-empty and free of commas, spaces, '=', quotes and backslashes")]
    InvalidPath(String),

    #[error("z85: {0}")]
    Codec(#[from] Z85Error),

    #[error("{0}")]
    Other(String),
}

fn join(items: &[String]) -> String {
    items.join(", ")
}
