//! [`Snapshot`]: an immutable materialized view of a table at some version, and [`SnapshotFactory`],
//! which builds one from a [`LogSegment`] and retries past checkpoint corruption.

pub mod cache;

use std::sync::Arc;

use uuid::Uuid;

use crate::actions::{Checksum, Protocol, TableMetadata};
use crate::config::SnapshotCacheConfig;
use crate::error::{DeltaResult, Error};
use crate::log_segment::LogSegment;
use crate::path::Version;
use crate::replay;
use crate::storage::StorageHandler;

/// Anything with a version number (spec §9: generic over "anything with a version").
pub trait Versioned {
    fn version(&self) -> Version;
}

/// Anything backed by a [`LogSegment`].
pub trait LogProvider {
    fn log_segment(&self) -> &LogSegment;
}

/// Immutable, derived table state: `(version, logSegment, tableMetadata, protocol,
/// minFileRetentionTimestamp, checksumOpt)` (spec §3).
#[derive(Debug, Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

#[derive(Debug)]
struct SnapshotInner {
    version: i64,
    log_segment: Option<LogSegment>,
    table_metadata: TableMetadata,
    protocol: Protocol,
    min_file_retention_timestamp: i64,
    checksum: Option<Checksum>,
}

impl Snapshot {
    fn new(
        version: Version,
        log_segment: LogSegment,
        table_metadata: TableMetadata,
        protocol: Protocol,
        checksum: Option<Checksum>,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                version: version as i64,
                log_segment: Some(log_segment),
                table_metadata,
                protocol,
                min_file_retention_timestamp: 0,
                checksum,
            }),
        }
    }

    /// A directory with no log at all: `version = -1`, empty metadata (spec §3
    /// `InitialSnapshot`).
    pub fn initial() -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                version: crate::path::PRE_GENESIS_VERSION,
                log_segment: None,
                table_metadata: TableMetadata {
                    table_id: Uuid::nil(),
                    location: None,
                    current_schema_id: None,
                    schemas: Default::default(),
                    default_spec_id: None,
                    partition_specs: Default::default(),
                    default_sort_order_id: None,
                    sort_orders: Default::default(),
                    properties: Default::default(),
                    refs: Default::default(),
                    snapshots: Vec::new(),
                },
                protocol: Protocol::default(),
                min_file_retention_timestamp: 0,
                checksum: None,
            }),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.inner.log_segment.is_none()
    }

    /// `-1` for [`Self::initial`], otherwise the materialized version.
    pub fn version_raw(&self) -> i64 {
        self.inner.version
    }

    pub fn table_id(&self) -> Uuid {
        self.inner.table_metadata.table_id
    }

    pub fn table_metadata(&self) -> &TableMetadata {
        &self.inner.table_metadata
    }

    pub fn protocol(&self) -> &Protocol {
        &self.inner.protocol
    }

    pub fn min_file_retention_timestamp(&self) -> i64 {
        self.inner.min_file_retention_timestamp
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.inner.checksum.as_ref()
    }

    fn log_segment_opt(&self) -> Option<&LogSegment> {
        self.inner.log_segment.as_ref()
    }

    /// The checkpoint version to hand `LogSegmentBuilder` as a hint on the next refresh, or
    /// `None` for an `InitialSnapshot` (start listing from version 0).
    pub(crate) fn checkpoint_version_hint(&self) -> Option<Version> {
        self.log_segment_opt().and_then(|s| s.checkpoint_version)
    }
}

impl Versioned for Snapshot {
    fn version(&self) -> Version {
        self.inner.version.max(0) as Version
    }
}

impl LogProvider for Snapshot {
    fn log_segment(&self) -> &LogSegment {
        self.inner
            .log_segment
            .as_ref()
            .expect("log_segment() called on an InitialSnapshot; check is_initial() first")
    }
}

/// Cache-freshness comparison used by `updateInternal`'s fast path (spec §4.5 step 2): two
/// snapshots are equivalent exactly when their log segments are equal (spec §3 equality), with
/// both being `InitialSnapshot` also counting as equal.
pub fn same_materialized_state(a: &Snapshot, b: &Snapshot) -> bool {
    match (a.log_segment_opt(), b.log_segment_opt()) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Wraps a [`LogSegment`] into a [`Snapshot`], retrying against progressively older checkpoints
/// when replay reports [`Error::CheckpointCorruption`] (spec §4.4).
pub struct SnapshotFactory<'a> {
    storage: &'a dyn StorageHandler,
    config: SnapshotCacheConfig,
}

impl<'a> SnapshotFactory<'a> {
    pub fn new(storage: &'a dyn StorageHandler, config: SnapshotCacheConfig) -> Self {
        Self { storage, config }
    }

    /// `createSnapshot(segment) -> Snapshot`: a single attempt, no retry.
    pub fn create_snapshot(&self, segment: LogSegment) -> DeltaResult<Snapshot> {
        let version = segment.version;
        let (table_metadata, protocol) = replay::replay(self.storage, &segment)?;
        let checksum = replay::read_checksum(self.storage, &segment, version).unwrap_or(None);
        Ok(Snapshot::new(
            version,
            segment,
            table_metadata,
            protocol,
            checksum,
        ))
    }

    /// `createWithRetry(initialSegment, maker) -> Snapshot` (spec §4.4): on
    /// `CheckpointCorruption`, rebuild with the checkpoint excluded and retry, preserving the
    /// first error seen if retries are exhausted or no earlier checkpoint exists.
    pub fn create_with_retry(
        &self,
        initial_segment: LogSegment,
        rebuild_excluding_checkpoint: impl Fn(Version, Version) -> DeltaResult<Option<LogSegment>>,
    ) -> DeltaResult<Snapshot> {
        let mut segment = initial_segment;
        let mut first_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            match self.create_snapshot(segment.clone()) {
                Ok(snapshot) => return Ok(snapshot),
                Err(err @ Error::CheckpointCorruption { .. }) => {
                    first_error.get_or_insert_with(|| clone_shallow(&err));
                    if attempt >= self.config.max_retries {
                        return Err(first_error.unwrap());
                    }
                    let Some(checkpoint_version) = segment.checkpoint_version else {
                        return Err(first_error.unwrap());
                    };
                    match rebuild_excluding_checkpoint(segment.version, checkpoint_version)? {
                        Some(next) => {
                            tracing::warn!(
                                version = segment.version,
                                corrupt_checkpoint = checkpoint_version,
                                "retrying snapshot construction against an earlier checkpoint"
                            );
                            segment = next;
                        }
                        None => return Err(first_error.unwrap()),
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(first_error.unwrap_or_else(|| Error::generic("snapshot construction failed")))
    }
}

/// `Error` does not implement `Clone` (it boxes `source` chains and wraps foreign error types);
/// this produces a display-equivalent `CheckpointCorruption` for "preserve the first error"
/// semantics without requiring the whole enum to be cloneable.
fn clone_shallow(err: &Error) -> Error {
    if let Error::CheckpointCorruption { version, source } = err {
        Error::CheckpointCorruption {
            version: *version,
            source: Box::new(Error::generic(source.to_string())),
        }
    } else {
        Error::generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_segment::LogSegmentBuilder;
    use object_store::ObjectStore as _;
    use test_log::test;
    use test_utils::{add_checkpoint, add_commit, delta_path_for_version, genesis_actions, storage_handler_setup};

    #[test]
    fn initial_snapshot_has_sentinel_version() {
        let snapshot = Snapshot::initial();
        assert!(snapshot.is_initial());
        assert_eq!(snapshot.version_raw(), crate::path::PRE_GENESIS_VERSION);
        assert_eq!(snapshot.version(), 0);
    }

    /// Spec §4.4: a checkpoint that fails to parse must not fail snapshot construction outright
    /// when an earlier complete checkpoint is available to fall back onto.
    #[test]
    fn corrupt_checkpoint_falls_back_to_earlier_checkpoint() {
        let (store, storage, log_root) = storage_handler_setup();
        futures::executor::block_on(async {
            for v in 0..=5u64 {
                add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
            }
            add_checkpoint(store.as_ref(), 2, genesis_actions()).await.unwrap();
            // unparsable: replay must report CheckpointCorruption so the factory retries
            // against the version-2 checkpoint instead.
            let path = delta_path_for_version(4, "checkpoint.parquet");
            store.put(&path, "not valid ndjson".to_string().into()).await.unwrap();
        });

        let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
        let segment = builder.build(None, None).unwrap();
        assert_eq!(segment.checkpoint_version, Some(4));

        let factory = SnapshotFactory::new(storage.as_ref(), SnapshotCacheConfig::default());
        let snapshot = factory
            .create_with_retry(segment, |snapshot_version, max_exclusive_ckpt| {
                builder.build_with_exclusive_ceiling(snapshot_version, max_exclusive_ckpt)
            })
            .unwrap();
        assert_eq!(snapshot.version(), 5);
        assert_eq!(snapshot.log_segment().checkpoint_version, Some(2));
    }

    /// When no earlier checkpoint covers the gap left by excluding the corrupt one, the first
    /// `CheckpointCorruption` seen must surface rather than an opaque downstream error.
    #[test]
    fn retry_without_recovery_surfaces_first_corruption_error() {
        let (store, storage, log_root) = storage_handler_setup();
        futures::executor::block_on(async {
            // commit 0 is gone, so excluding the checkpoint at version 1 leaves a gap the
            // fallback rebuild can't verify as contiguous from genesis.
            add_commit(store.as_ref(), 1, genesis_actions()).await.unwrap();
            add_commit(store.as_ref(), 2, genesis_actions()).await.unwrap();
            let path = delta_path_for_version(1, "checkpoint.parquet");
            store.put(&path, "not valid ndjson".to_string().into()).await.unwrap();
        });

        let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
        let segment = builder.build(None, None).unwrap();
        assert_eq!(segment.checkpoint_version, Some(1));

        let factory = SnapshotFactory::new(storage.as_ref(), SnapshotCacheConfig::default());
        let err = factory
            .create_with_retry(segment, |snapshot_version, max_exclusive_ckpt| {
                builder.build_with_exclusive_ceiling(snapshot_version, max_exclusive_ckpt)
            })
            .unwrap_err();
        assert!(matches!(err, Error::CheckpointCorruption { version: 1, .. }));
    }
}
