//! The storage backend contract (spec §6): a minimal seam between the log segment / snapshot
//! machinery and whatever object store or filesystem actually holds `_delta_log`.

use bytes::Bytes;
use url::Url;

use crate::error::DeltaResult;

/// Metadata for a single entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub location: Url,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    pub size: u64,
}

/// Storage backend seam used by [`crate::log_segment::LogSegmentBuilder`] and
/// [`crate::checkpoint::CheckpointSelector`].
///
/// A single call to `list_from` must return a snapshot-consistent listing (no entry appears or
/// disappears mid-call); consecutive calls need not agree with each other, since writers and
/// garbage collectors may mutate the directory between calls (spec §4.1).
pub trait StorageHandler: Send + Sync {
    /// List every entry under `path` whose file name sorts at or after the encoded version
    /// marker, in ascending name order. Implementations are not expected to interpret log file
    /// names; that filtering happens one layer up, in [`crate::log_segment`].
    fn list_from(&self, path: &Url, start_version: crate::path::Version) -> DeltaResult<Vec<FileMeta>>;

    /// Read the full contents of a single file.
    fn read_file(&self, file: &FileMeta) -> DeltaResult<Bytes>;
}
