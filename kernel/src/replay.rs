//! Turning a [`LogSegment`] into table state by reading and folding its actions.
//!
//! Checkpoint and commit files both carry newline-delimited JSON-encoded [`Action`]s (spec §3
//! supplement); replay applies checkpoint actions first (if any), then each delta file's actions
//! in ascending version order, into one [`TableMetadataBuilder`].

use crate::actions::{Action, Checksum, Protocol, TableMetadata, TableMetadataBuilder};
use crate::error::{DeltaResult, Error};
use crate::log_segment::LogSegment;
use crate::path::{crc_file_name, Version};
use crate::storage::StorageHandler;

fn parse_actions(bytes: &[u8]) -> DeltaResult<Vec<Action>> {
    bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).map_err(Error::from))
        .collect()
}

/// Read and fold every action in `segment` into a `(TableMetadata, Protocol)` pair.
///
/// A parse failure on a checkpoint file is reported as [`Error::CheckpointCorruption`] so
/// [`crate::snapshot::SnapshotFactory`] can retry against an earlier checkpoint; a parse failure
/// on a commit file is not recoverable and is surfaced as-is.
pub fn replay(
    storage: &dyn StorageHandler,
    segment: &LogSegment,
) -> DeltaResult<(TableMetadata, Protocol)> {
    let mut builder = TableMetadataBuilder::new();

    for file in &segment.checkpoint {
        let bytes = storage.read_file(file)?;
        let actions = parse_actions(&bytes).map_err(|source| Error::CheckpointCorruption {
            version: segment.checkpoint_version.unwrap_or(segment.version),
            source: Box::new(source),
        })?;
        builder.apply_all(&actions);
    }

    for file in &segment.deltas {
        let bytes = storage.read_file(file)?;
        let actions = parse_actions(&bytes)?;
        builder.apply_all(&actions);
    }

    builder.build(segment.version)
}

/// Opportunistically read the `.crc` sidecar for `version`, if present. Absence is not an error:
/// the sidecar is purely an accelerator (spec §3: "Presence is opportunistic").
pub fn read_checksum(
    storage: &dyn StorageHandler,
    segment: &LogSegment,
    version: Version,
) -> DeltaResult<Option<Checksum>> {
    let location = segment.log_path.join(&crc_file_name(version))?;
    let candidates = storage.list_from(&segment.log_path, version)?;
    let Some(meta) = candidates.into_iter().find(|m| m.location == location) else {
        return Ok(None);
    };
    let bytes = storage.read_file(&meta)?;
    let checksum: Checksum = serde_json::from_slice(&bytes)?;
    Ok(Some(checksum))
}
