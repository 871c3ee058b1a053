//! Error types returned by this crate.

use crate::path::Version;

/// A result type for this crate.
pub type DeltaResult<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced while listing a log directory, building a [`crate::log_segment::LogSegment`],
/// constructing a [`crate::snapshot::Snapshot`], or refreshing a
/// [`crate::snapshot::cache::SnapshotCache`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The log directory exists but is empty and no starting checkpoint hint was provided.
    #[error("log directory {0} is empty")]
    EmptyDirectory(String),

    /// Contiguity of the delta chain was broken at the given version.
    #[error("missing delta file for version {0}")]
    MissingDeltaFile(Version),

    /// The versions present are not a strict consecutive range.
    #[error("non-contiguous versions in log segment (expected next version {expected}, found {found})")]
    NonContiguousVersions { expected: Version, found: Version },

    /// A multi-part checkpoint is missing shards and no fallback checkpoint exists.
    #[error("missing checkpoint parts for checkpoint at version {0}")]
    MissingCheckpointParts(Version),

    /// An assertion about log state that should be unreachable in a well-formed table.
    #[error("illegal log state: {0}")]
    IllegalLogState(String),

    /// A checkpoint was listed but its content could not be parsed/replayed.
    #[error("checkpoint at version {version} is corrupt: {source}")]
    CheckpointCorruption {
        version: Version,
        #[source]
        source: Box<Error>,
    },

    /// The `_delta_log` directory (or the table root) does not exist.
    #[error("log directory not found: {0}")]
    FileNotFound(String),

    /// The calling thread was interrupted while waiting to acquire the update lock.
    #[error("operation cancelled")]
    Cancelled,

    /// Catch-all for invalid log file names, bad hint files, and the like.
    #[error("{0}")]
    Generic(String),

    #[error("invalid log path: {0}")]
    InvalidLogPath(String),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// True for a missing table root or log directory. Used by the cache to decide whether a
    /// refresh failure should collapse to [`crate::snapshot::Snapshot::initial`] or be re-raised.
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, Error::FileNotFound(_))
            || matches!(self, Error::ObjectStore(object_store::Error::NotFound { .. }))
    }
}
