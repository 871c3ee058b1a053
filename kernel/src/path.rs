//! Parsing and formatting of `_delta_log` file names.
//!
//! File naming is bit-exact with the wire contract: commits are
//! `NNNNNNNNNNNNNNNNNNNN.json` (20-digit zero-padded version), single-part checkpoints are
//! `NNNNNNNNNNNNNNNNNNNN.checkpoint.parquet`, and multi-part checkpoints are
//! `NNNNNNNNNNNNNNNNNNNN.checkpoint.PPPPPPPPPP.TTTTTTTTTT.parquet` with `P` in `[1..=T]`.

use std::cmp::Ordering;
use std::fmt;

use url::Url;

use crate::error::{DeltaResult, Error};
use crate::storage::FileMeta;

/// A non-negative version number. `-1` (outside this type; callers use `Option<Version>` or the
/// sentinel constant) denotes the pre-genesis empty state.
pub type Version = u64;

/// Sentinel used where the data model calls for a "pre-genesis" version (spec §3).
pub const PRE_GENESIS_VERSION: i64 = -1;

const COMMIT_EXT: &str = "json";
const CHECKPOINT_EXT: &str = "parquet";
const LAST_CHECKPOINT_NAME: &str = "_last_checkpoint";
const CRC_EXT: &str = "crc";

/// What kind of log file a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogPathFileType {
    /// `v.json`
    Commit,
    /// `v.checkpoint.parquet`
    SinglePartCheckpoint,
    /// `v.checkpoint.<part>.<total>.parquet`
    MultiPartCheckpoint { part: u32, num_parts: u32 },
    /// `v.crc`, an optional accelerator sidecar carrying a checksum/protocol/metadata summary.
    Crc,
}

impl LogPathFileType {
    /// Relative ordering of file kinds sharing the same version, used when a reader needs a
    /// stable ascending `(version, kind)` ordering (spec §4.1).
    fn kind_rank(&self) -> u32 {
        match self {
            LogPathFileType::Crc => 0,
            LogPathFileType::SinglePartCheckpoint => 1,
            LogPathFileType::MultiPartCheckpoint { .. } => 1,
            LogPathFileType::Commit => 2,
        }
    }
}

/// A parsed `_delta_log` entry: its version, its kind, where it lives, and the attributes a
/// directory listing carries for it (spec §3: "absolute path, modification time, byte length").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLogPath {
    pub location: Url,
    pub version: Version,
    pub file_type: LogPathFileType,
    pub last_modified: i64,
    pub size: u64,
}

impl PartialOrd for ParsedLogPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedLogPath {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.version, self.file_type.kind_rank(), self.location.as_str())
            .cmp(&(other.version, other.file_type.kind_rank(), other.location.as_str()))
    }
}

fn classify(file_name: &str) -> DeltaResult<Option<(Version, LogPathFileType)>> {
    if file_name == LAST_CHECKPOINT_NAME {
        return Ok(None);
    }

    let mut parts = file_name.split('.');
    let version_str = parts.next().unwrap_or_default();
    if version_str.len() != 20 || !version_str.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let version: Version = version_str
        .parse()
        .map_err(|_| Error::InvalidLogPath(file_name.to_string()))?;

    let rest: Vec<&str> = parts.collect();
    let file_type = match rest.as_slice() {
        [COMMIT_EXT] => LogPathFileType::Commit,
        ["checkpoint", CHECKPOINT_EXT] => LogPathFileType::SinglePartCheckpoint,
        ["checkpoint", part, total, CHECKPOINT_EXT] => {
            let part: u32 = part
                .parse()
                .map_err(|_| Error::InvalidLogPath(file_name.to_string()))?;
            let num_parts: u32 = total
                .parse()
                .map_err(|_| Error::InvalidLogPath(file_name.to_string()))?;
            LogPathFileType::MultiPartCheckpoint { part, num_parts }
        }
        [CRC_EXT] => LogPathFileType::Crc,
        _ => return Ok(None),
    };
    Ok(Some((version, file_type)))
}

impl ParsedLogPath {
    /// Parse a single filename (no directory component) within a `_delta_log/` root, without any
    /// listing attributes. Useful when only the name matters (e.g. confirming a hinted
    /// checkpoint's expected file names).
    ///
    /// Returns `Ok(None)` for anything that is not a recognized log file (e.g. `_last_checkpoint`
    /// or an unrelated file) so callers can filter a directory listing down to log files only.
    pub fn try_parse(log_root: &Url, file_name: &str) -> DeltaResult<Option<Self>> {
        let Some((version, file_type)) = classify(file_name)? else {
            return Ok(None);
        };
        let location = log_root.join(file_name)?;
        Ok(Some(Self {
            location,
            version,
            file_type,
            last_modified: 0,
            size: 0,
        }))
    }

    /// Parse a directory-listing entry, carrying its modification time and byte length through.
    pub fn from_file_meta(meta: &FileMeta) -> DeltaResult<Option<Self>> {
        let file_name = meta
            .location
            .path_segments()
            .and_then(|mut s| s.next_back())
            .ok_or_else(|| Error::InvalidLogPath(meta.location.to_string()))?;
        let Some((version, file_type)) = classify(file_name)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            location: meta.location.clone(),
            version,
            file_type,
            last_modified: meta.last_modified,
            size: meta.size,
        }))
    }

    pub fn is_commit(&self) -> bool {
        matches!(self.file_type, LogPathFileType::Commit)
    }

    pub fn is_checkpoint(&self) -> bool {
        matches!(
            self.file_type,
            LogPathFileType::SinglePartCheckpoint | LogPathFileType::MultiPartCheckpoint { .. }
        )
    }

    pub fn is_crc(&self) -> bool {
        matches!(self.file_type, LogPathFileType::Crc)
    }
}

impl fmt::Display for ParsedLogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

pub fn last_checkpoint_path(log_root: &Url) -> DeltaResult<Url> {
    Ok(log_root.join(LAST_CHECKPOINT_NAME)?)
}

pub fn checkpoint_file_name(version: Version) -> String {
    format!("{version:020}.checkpoint.{CHECKPOINT_EXT}")
}

pub fn multipart_checkpoint_file_name(version: Version, part: u32, num_parts: u32) -> String {
    format!("{version:020}.checkpoint.{part:010}.{num_parts:010}.{CHECKPOINT_EXT}")
}

pub fn crc_file_name(version: Version) -> String {
    format!("{version:020}.{CRC_EXT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("memory:///_delta_log/").unwrap()
    }

    #[test]
    fn parses_commit() {
        let p = ParsedLogPath::try_parse(&root(), "00000000000000000005.json")
            .unwrap()
            .unwrap();
        assert_eq!(p.version, 5);
        assert_eq!(p.file_type, LogPathFileType::Commit);
    }

    #[test]
    fn parses_single_checkpoint() {
        let p = ParsedLogPath::try_parse(&root(), "00000000000000000007.checkpoint.parquet")
            .unwrap()
            .unwrap();
        assert_eq!(p.version, 7);
        assert_eq!(p.file_type, LogPathFileType::SinglePartCheckpoint);
    }

    #[test]
    fn parses_multipart_checkpoint() {
        let p = ParsedLogPath::try_parse(
            &root(),
            "00000000000000000003.checkpoint.0000000001.0000000002.parquet",
        )
        .unwrap()
        .unwrap();
        assert_eq!(p.version, 3);
        assert_eq!(
            p.file_type,
            LogPathFileType::MultiPartCheckpoint {
                part: 1,
                num_parts: 2
            }
        );
    }

    #[test]
    fn ignores_last_checkpoint_and_junk() {
        assert!(ParsedLogPath::try_parse(&root(), "_last_checkpoint")
            .unwrap()
            .is_none());
        assert!(ParsedLogPath::try_parse(&root(), "README.md")
            .unwrap()
            .is_none());
    }

    #[test]
    fn parses_crc() {
        let p = ParsedLogPath::try_parse(&root(), "00000000000000000002.crc")
            .unwrap()
            .unwrap();
        assert_eq!(p.version, 2);
        assert_eq!(p.file_type, LogPathFileType::Crc);
    }
}
