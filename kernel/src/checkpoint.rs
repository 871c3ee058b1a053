//! Checkpoint discovery: picking the newest *complete* checkpoint not exceeding a version bound,
//! and the backward search used by fallback recovery (spec §4.2).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DeltaResult;
use crate::path::{LogPathFileType, ParsedLogPath, Version};
use crate::storage::StorageHandler;

/// `_delta_log/_last_checkpoint`: an advisory pointer to the most recently finalized checkpoint.
/// Correctness never depends on this file being present or accurate (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCheckpointHint {
    pub version: Version,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<u32>,
}

/// `(version, numParts?)`. Ordered by `version` ascending, then by `numParts` ascending with an
/// absent `numParts` sorting below any present value (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckpointInstance {
    pub version: Version,
    pub num_parts: Option<u32>,
}

impl CheckpointInstance {
    /// A synthetic instance no real checkpoint can exceed; used for unbounded searches.
    pub const MAX: CheckpointInstance = CheckpointInstance {
        version: Version::MAX,
        num_parts: Some(u32::MAX),
    };

    pub fn new(version: Version, num_parts: Option<u32>) -> Self {
        Self { version, num_parts }
    }

    fn ceiling_at(version: Version) -> Self {
        Self {
            version,
            num_parts: Some(u32::MAX),
        }
    }
}

/// One grouping key for the checkpoint files observed in a listing: all parts sharing the same
/// `(version, total-parts)` pair belong to the same checkpoint instance.
fn instance_key(path: &ParsedLogPath) -> Option<(Version, Option<u32>)> {
    match path.file_type {
        LogPathFileType::SinglePartCheckpoint => Some((path.version, None)),
        LogPathFileType::MultiPartCheckpoint { num_parts, .. } => {
            Some((path.version, Some(num_parts)))
        }
        _ => None,
    }
}

/// Among listed checkpoint file paths, selects the latest *complete* checkpoint not exceeding
/// `upper_bound`.
pub struct CheckpointSelector;

impl CheckpointSelector {
    /// Of the checkpoint instances present in `candidates`, return the maximum complete instance
    /// with `CheckpointInstance <= upper_bound`, plus the file(s) that make it up.
    pub fn latest_complete(
        candidates: &[ParsedLogPath],
        upper_bound: CheckpointInstance,
    ) -> Option<(CheckpointInstance, Vec<ParsedLogPath>)> {
        let mut groups: std::collections::BTreeMap<(Version, Option<u32>), Vec<ParsedLogPath>> =
            Default::default();
        for path in candidates {
            if let Some(key) = instance_key(path) {
                groups.entry(key).or_default().push(path.clone());
            }
        }

        groups
            .into_iter()
            .filter_map(|((version, num_parts), files)| {
                let instance = CheckpointInstance { version, num_parts };
                if instance > upper_bound {
                    return None;
                }
                if !is_complete(num_parts, &files) {
                    return None;
                }
                Some((instance, files))
            })
            .max_by_key(|(instance, _)| *instance)
    }

    /// Scan backward from `upper_bound`, consulting `hint` as an accelerator before falling back
    /// to a directory listing, and return the first complete checkpoint instance found.
    pub fn find_last_complete_before(
        storage: &dyn StorageHandler,
        log_root: &Url,
        upper_bound: Version,
        hint: Option<&LastCheckpointHint>,
    ) -> DeltaResult<Option<(CheckpointInstance, Vec<ParsedLogPath>)>> {
        if let Some(hint) = hint {
            if hint.version <= upper_bound {
                if let Some(found) = Self::try_confirm_hint(storage, log_root, hint)? {
                    return Ok(Some(found));
                }
                tracing::debug!(
                    hint_version = hint.version,
                    "last_checkpoint hint did not resolve to a complete checkpoint, falling back to listing"
                );
            }
        }

        let listing = storage.list_from(log_root, 0)?;
        let checkpoint_files: Vec<ParsedLogPath> = listing
            .iter()
            .filter_map(|meta| ParsedLogPath::from_file_meta(meta).ok().flatten())
            .filter(|p| p.is_checkpoint() && p.size > 0 && p.version <= upper_bound)
            .collect();

        Ok(Self::latest_complete(
            &checkpoint_files,
            CheckpointInstance::ceiling_at(upper_bound),
        ))
    }

    /// Attempt to confirm the hinted checkpoint exists and is complete without a full directory
    /// listing: list just the hinted version's entries and check for the expected part file(s).
    fn try_confirm_hint(
        storage: &dyn StorageHandler,
        log_root: &Url,
        hint: &LastCheckpointHint,
    ) -> DeltaResult<Option<(CheckpointInstance, Vec<ParsedLogPath>)>> {
        let listing = storage.list_from(log_root, hint.version)?;
        let files: Vec<ParsedLogPath> = listing
            .iter()
            .filter_map(|meta| ParsedLogPath::from_file_meta(meta).ok().flatten())
            .filter(|p| p.is_checkpoint() && p.size > 0 && p.version == hint.version)
            .collect();

        let instance = CheckpointInstance::new(hint.version, hint.parts);
        Ok(Self::latest_complete(&files, instance))
    }
}

fn is_complete(num_parts: Option<u32>, files: &[ParsedLogPath]) -> bool {
    match num_parts {
        None => !files.is_empty(),
        Some(total) => {
            let seen: HashSet<u32> = files
                .iter()
                .filter_map(|p| match p.file_type {
                    LogPathFileType::MultiPartCheckpoint { part, .. } => Some(part),
                    _ => None,
                })
                .collect();
            seen.len() as u32 == total && (1..=total).all(|part| seen.contains(&part))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ParsedLogPath;

    fn root() -> Url {
        Url::parse("memory:///_delta_log/").unwrap()
    }

    fn parse(name: &str) -> ParsedLogPath {
        ParsedLogPath::try_parse(&root(), name).unwrap().unwrap()
    }

    #[test]
    fn single_part_checkpoint_is_complete() {
        let files = vec![parse("00000000000000000007.checkpoint.parquet")];
        let result = CheckpointSelector::latest_complete(&files, CheckpointInstance::MAX);
        assert_eq!(result.unwrap().0, CheckpointInstance::new(7, None));
    }

    #[test]
    fn incomplete_multipart_is_not_selected() {
        let files = vec![parse(
            "00000000000000000003.checkpoint.0000000001.0000000002.parquet",
        )];
        assert!(CheckpointSelector::latest_complete(&files, CheckpointInstance::MAX).is_none());
    }

    #[test]
    fn complete_multipart_beats_older_single_part() {
        let files = vec![
            parse("00000000000000000001.checkpoint.parquet"),
            parse("00000000000000000003.checkpoint.0000000001.0000000002.parquet"),
            parse("00000000000000000003.checkpoint.0000000002.0000000002.parquet"),
        ];
        let (instance, parts) =
            CheckpointSelector::latest_complete(&files, CheckpointInstance::MAX).unwrap();
        assert_eq!(instance, CheckpointInstance::new(3, Some(2)));
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn respects_upper_bound() {
        let files = vec![
            parse("00000000000000000001.checkpoint.parquet"),
            parse("00000000000000000010.checkpoint.parquet"),
        ];
        let result =
            CheckpointSelector::latest_complete(&files, CheckpointInstance::ceiling_at(5));
        assert_eq!(result.unwrap().0, CheckpointInstance::new(1, None));
    }
}
