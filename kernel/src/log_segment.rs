//! Reconstructing the file manifest needed to materialize a table version (spec §4.3).
//!
//! [`LogSegmentBuilder`] is the hard part of this crate: given a directory that other writers may
//! be mutating concurrently, and an optional starting-checkpoint hint, it produces a
//! [`LogSegment`] whose deltas are provably contiguous from the chosen checkpoint (or genesis) up
//! to the target version.

#[cfg(test)]
mod tests;

use std::hash::{Hash, Hasher};

use url::Url;

use crate::checkpoint::{CheckpointInstance, CheckpointSelector, LastCheckpointHint};
use crate::error::{DeltaResult, Error};
use crate::path::{ParsedLogPath, Version};
use crate::storage::StorageHandler;

/// The set of files that, replayed in order, reconstruct a specific version of the table.
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct LogSegment {
    pub log_path: Url,
    pub version: Version,
    pub deltas: Vec<ParsedLogPath>,
    pub checkpoint: Vec<ParsedLogPath>,
    pub checkpoint_version: Option<Version>,
    pub last_commit_timestamp: Option<i64>,
}

impl PartialEq for LogSegment {
    /// Cache-freshness equality: only `(logPath, version, lastCommitTimestamp)` matter
    /// (spec §3).
    fn eq(&self, other: &Self) -> bool {
        self.log_path == other.log_path
            && self.version == other.version
            && self.last_commit_timestamp == other.last_commit_timestamp
    }
}

impl Eq for LogSegment {}

impl Hash for LogSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.log_path.hash(state);
        // low bits only: a slow-moving timestamp doesn't need the full 64 bits of entropy
        ((self.last_commit_timestamp.unwrap_or(0) as u64) & 0xFFFF_FFFF).hash(state);
    }
}

impl LogSegment {
    fn commit_only(log_path: Url, deltas: Vec<ParsedLogPath>, version: Version) -> Self {
        let last_commit_timestamp = deltas.last().map(|d| d.last_modified);
        Self {
            log_path,
            version,
            deltas,
            checkpoint: Vec::new(),
            checkpoint_version: None,
            last_commit_timestamp,
        }
    }

    fn with_checkpoint(
        log_path: Url,
        deltas: Vec<ParsedLogPath>,
        checkpoint: Vec<ParsedLogPath>,
        checkpoint_version: Version,
        version: Version,
    ) -> Self {
        let last_commit_timestamp = deltas.last().map(|d| d.last_modified);
        Self {
            log_path,
            version,
            deltas,
            checkpoint,
            checkpoint_version: Some(checkpoint_version),
            last_commit_timestamp,
        }
    }
}

/// Verifies `deltas` are a strictly contiguous ascending run starting at `expect_first`, and (if
/// `expect_last` is given) ending there. Returns the checked slice unchanged.
fn verify_contiguous(
    deltas: &[ParsedLogPath],
    expect_first: Version,
    expect_last: Option<Version>,
) -> DeltaResult<()> {
    let mut expected = expect_first;
    for delta in deltas {
        if delta.version != expected {
            if delta.version > expected {
                return Err(Error::MissingDeltaFile(expected));
            }
            return Err(Error::NonContiguousVersions {
                expected,
                found: delta.version,
            });
        }
        expected += 1;
    }
    if let Some(last) = expect_last {
        if deltas.last().map(|d| d.version) != Some(last) {
            return Err(Error::MissingDeltaFile(
                deltas.last().map(|d| d.version + 1).unwrap_or(expect_first),
            ));
        }
    }
    Ok(())
}

/// Builds [`LogSegment`]s for a single `_delta_log` directory.
pub struct LogSegmentBuilder<'a> {
    storage: &'a dyn StorageHandler,
    log_root: Url,
}

impl<'a> LogSegmentBuilder<'a> {
    pub fn new(storage: &'a dyn StorageHandler, log_root: Url) -> Self {
        Self { storage, log_root }
    }

    /// Lists from `start_version`, classifies into deltas/checkpoints, and truncates to
    /// `ceiling` when given. Also reports whether *any* commit file existed prior to truncation,
    /// needed to distinguish "nothing past the ceiling" from "genuinely empty" (spec §4.3 step 9).
    fn list_and_partition(
        &self,
        start_version: Version,
        ceiling: Option<Version>,
    ) -> DeltaResult<(Vec<ParsedLogPath>, Vec<ParsedLogPath>, bool)> {
        let raw = self.storage.list_from(&self.log_root, start_version)?;
        let mut deltas = Vec::new();
        let mut checkpoints = Vec::new();
        let mut raw_had_deltas = false;
        for meta in &raw {
            let Some(parsed) = ParsedLogPath::from_file_meta(meta)? else {
                continue;
            };
            if parsed.is_checkpoint() && parsed.size == 0 {
                // half-written checkpoint: would be silently misread downstream (spec §4.1)
                continue;
            }
            if parsed.is_commit() {
                raw_had_deltas = true;
            }
            if let Some(ceiling) = ceiling {
                if parsed.version > ceiling {
                    continue;
                }
            }
            if parsed.is_commit() {
                deltas.push(parsed);
            } else if parsed.is_checkpoint() {
                checkpoints.push(parsed);
            }
        }
        deltas.sort();
        checkpoints.sort();
        Ok((deltas, checkpoints, raw_had_deltas))
    }

    /// `build(startCheckpointHint, versionToLoad) -> LogSegment` (spec §4.3).
    pub fn build(
        &self,
        start_checkpoint_hint: Option<Version>,
        version_to_load: Option<Version>,
    ) -> DeltaResult<LogSegment> {
        let start_version = start_checkpoint_hint.unwrap_or(0);
        let (deltas, checkpoints, raw_had_deltas) =
            self.list_and_partition(start_version, version_to_load)?;

        if deltas.is_empty() && checkpoints.is_empty() && !raw_had_deltas {
            if start_checkpoint_hint.is_none() {
                return Err(Error::EmptyDirectory(self.log_root.to_string()));
            }
            // stale singleton hint after directory recreation: retry from scratch
            tracing::debug!("listing from hint was empty, retrying with no hint");
            return self.build(None, version_to_load);
        }

        let ceiling = CheckpointInstance {
            version: version_to_load.unwrap_or(Version::MAX),
            num_parts: Some(u32::MAX),
        };
        let new_checkpoint = CheckpointSelector::latest_complete(&checkpoints, ceiling);

        let (checkpoint_files, checkpoint_version) = match new_checkpoint {
            Some((instance, files)) => (files, Some(instance.version)),
            None => {
                if let Some(hint_version) = start_checkpoint_hint {
                    // the hinted checkpoint has disappeared from under us; try to recover
                    let ceiling_version = version_to_load.unwrap_or_else(|| {
                        deltas.last().map(|d| d.version).unwrap_or(hint_version)
                    });
                    return self
                        .build_with_exclusive_ceiling(ceiling_version, hint_version)?
                        .ok_or(Error::MissingCheckpointParts(hint_version));
                }
                (Vec::new(), None)
            }
        };

        let retained: Vec<ParsedLogPath> = deltas
            .into_iter()
            .filter(|d| checkpoint_version.map(|c| d.version > c).unwrap_or(true))
            .collect();

        if checkpoint_version.is_none() && retained.is_empty() && raw_had_deltas {
            // deltas exist somewhere in the directory but none survived truncation/filtering and
            // no checkpoint covers the gap: a directory with only pre-checkpoint deltas we can't
            // see is a corrupt log, not an empty one.
            return Err(Error::IllegalLogState(
                "log directory has commit files but none reachable from the requested range"
                    .to_string(),
            ));
        }

        let expect_first = checkpoint_version.map(|c| c + 1).unwrap_or(0);
        verify_contiguous(&retained, expect_first, version_to_load)?;

        let segment = match checkpoint_version {
            Some(c) => {
                let version = version_to_load
                    .or_else(|| retained.last().map(|d| d.version))
                    .unwrap_or(c);
                LogSegment::with_checkpoint(
                    self.log_root.clone(),
                    retained,
                    checkpoint_files,
                    c,
                    version,
                )
            }
            None => {
                let version = version_to_load
                    .or_else(|| retained.last().map(|d| d.version))
                    .ok_or_else(|| Error::EmptyDirectory(self.log_root.to_string()))?;
                LogSegment::commit_only(self.log_root.clone(), retained, version)
            }
        };

        Ok(segment)
    }

    /// `buildWithExclusiveCeiling(snapshotVersion, maxExclusiveCkpt)` (spec §4.3.1): used when a
    /// checkpoint we expected is missing or corrupt. Returns `Ok(None)` (not an error) when
    /// verification fails, so the caller can decide what to do next.
    pub fn build_with_exclusive_ceiling(
        &self,
        snapshot_version: Version,
        max_exclusive_ckpt: Version,
    ) -> DeltaResult<Option<LogSegment>> {
        if snapshot_version < max_exclusive_ckpt {
            return Err(Error::Generic(format!(
                "snapshot version {snapshot_version} is below the excluded checkpoint version {max_exclusive_ckpt}"
            )));
        }

        let search_bound = if max_exclusive_ckpt == 0 {
            None
        } else {
            Some(snapshot_version.min(max_exclusive_ckpt - 1))
        };

        let prev = match search_bound {
            Some(bound) => {
                CheckpointSelector::find_last_complete_before(self.storage, &self.log_root, bound, None)?
            }
            None => None,
        };

        match prev {
            Some((instance, checkpoint_files)) => {
                let (deltas, _, _) =
                    self.list_and_partition(instance.version + 1, Some(snapshot_version))?;
                if verify_contiguous(&deltas, instance.version + 1, Some(snapshot_version)).is_err() {
                    return Ok(None);
                }
                Ok(Some(LogSegment::with_checkpoint(
                    self.log_root.clone(),
                    deltas,
                    checkpoint_files,
                    instance.version,
                    snapshot_version,
                )))
            }
            None => {
                let (deltas, _, _) = self.list_and_partition(0, Some(snapshot_version))?;
                if verify_contiguous(&deltas, 0, Some(snapshot_version)).is_err() {
                    return Ok(None);
                }
                Ok(Some(LogSegment::commit_only(
                    self.log_root.clone(),
                    deltas,
                    snapshot_version,
                )))
            }
        }
    }

    pub fn read_last_checkpoint_hint(&self) -> DeltaResult<Option<LastCheckpointHint>> {
        let hint_path = crate::path::last_checkpoint_path(&self.log_root)?;
        let listing = self.storage.list_from(&self.log_root, 0)?;
        let Some(meta) = listing.into_iter().find(|m| m.location == hint_path) else {
            return Ok(None);
        };
        let bytes = self.storage.read_file(&meta)?;
        let hint: LastCheckpointHint = serde_json::from_slice(&bytes)?;
        Ok(Some(hint))
    }
}
