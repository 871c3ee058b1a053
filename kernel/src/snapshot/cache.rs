//! [`SnapshotCache`]: holds the current [`Snapshot`], arbitrates synchronous and asynchronous
//! refreshes, and enforces the table-identity-stable invariant (spec §4.5).

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use url::Url;
use uuid::Uuid;

use crate::checkpoint::CheckpointSelector;
use crate::config::SnapshotCacheConfig;
use crate::engine::default::executor::TaskExecutor;
use crate::error::{DeltaResult, Error};
use crate::log_segment::LogSegmentBuilder;
use crate::path::Version;
use crate::snapshot::{same_materialized_state, Snapshot, SnapshotFactory};
use crate::storage::StorageHandler;

/// Emitted (never thrown) when a refresh observes a `tableId` change against a version-bearing
/// prior snapshot (spec §4.5 step 4, §7 `TableIdentityChanged`): a recreated directory is a
/// legitimate operational case, not a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableIdentityChanged {
    pub old_table_id: Uuid,
    pub new_table_id: Uuid,
    pub new_version: Version,
}

/// Holds the current [`Snapshot`] for one table directory and knows how to refresh it.
///
/// `currentSnapshot` is published through a `RwLock<Arc<Snapshot>>`: writers replace the `Arc`
/// under `update_lock`, readers take an uncontended read lock and clone the `Arc`, which gives
/// the release/acquire publish semantics spec §5 asks for without requiring every reader to
/// contend with writers over more than the pointer swap itself.
pub struct SnapshotCache<E: TaskExecutor> {
    log_root: Url,
    storage: Arc<dyn StorageHandler>,
    executor: Arc<E>,
    config: SnapshotCacheConfig,

    current: RwLock<Arc<Snapshot>>,
    last_update_timestamp_ms: AtomicI64,
    async_inflight: AtomicBool,
    update_lock: Mutex<()>,
}

impl<E: TaskExecutor + 'static> SnapshotCache<E> {
    /// `getSnapshotAtInit` (spec §4.5): read the `LastCheckpointHint`, build the initial segment
    /// and snapshot, and collapse a missing `_delta_log` directory into an `InitialSnapshot`
    /// rather than failing table construction outright.
    ///
    /// Wrap the result in an `Arc` before calling [`Self::update`] with `stalenessAcceptable =
    /// true`: the async refresh path needs to hand a `'static` reference to the executor.
    pub fn try_new(
        log_root: Url,
        storage: Arc<dyn StorageHandler>,
        executor: Arc<E>,
        config: SnapshotCacheConfig,
    ) -> DeltaResult<Self> {
        let cache = Self {
            log_root,
            storage,
            executor,
            config,
            current: RwLock::new(Arc::new(Snapshot::initial())),
            last_update_timestamp_ms: AtomicI64::new(-1),
            async_inflight: AtomicBool::new(false),
            update_lock: Mutex::new(()),
        };

        // getSnapshotAtInit (spec §4.5): consult the LastCheckpointHint directly rather than
        // through `currentSnapshot` (which does not exist yet).
        let builder = LogSegmentBuilder::new(cache.storage.as_ref(), cache.log_root.clone());
        let init_hint = builder
            .read_last_checkpoint_hint()
            .unwrap_or(None)
            .map(|hint| hint.version);

        let initial = match cache.build_snapshot_at(init_hint, None) {
            Ok(snapshot) => snapshot,
            // Object-store-backed listings have no real notion of a missing directory: a
            // never-created `_delta_log` and an empty one both surface as a zero-entry listing,
            // which `LogSegmentBuilder` reports as `EmptyDirectory`. Collapse both that and a
            // genuine `FileNotFound` to `InitialSnapshot` at init time (spec §4.5).
            Err(err) if err.is_file_not_found() || matches!(err, Error::EmptyDirectory(_)) => {
                Snapshot::initial()
            }
            Err(err) => return Err(err),
        };
        *cache.current.write().unwrap() = Arc::new(initial);
        cache
            .last_update_timestamp_ms
            .store(now_millis(), Ordering::Release);
        Ok(cache)
    }

    /// `snapshot()`: return the current snapshot without refreshing.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().unwrap().clone()
    }

    /// `isStale()` (spec §4.5): staleness limit of zero always forces a refresh; a snapshot that
    /// has never been successfully loaded is always stale.
    pub fn is_stale(&self) -> bool {
        let limit = self.config.staleness_time_limit_ms;
        if limit == 0 {
            return true;
        }
        let last = self.last_update_timestamp_ms.load(Ordering::Acquire);
        last < 0 || now_millis() - last >= limit
    }

    /// `update(stalenessAcceptable) -> Snapshot` (spec §4.5).
    ///
    /// Takes `self: &Arc<Self>` rather than `&self`: the async path spawns a `'static` task on
    /// the injected [`TaskExecutor`], which needs to own a reference to the cache that outlives
    /// this call.
    pub fn update(self: &Arc<Self>, staleness_acceptable: bool) -> DeltaResult<Arc<Snapshot>> {
        let do_async = staleness_acceptable && !self.is_stale();
        if do_async {
            self.kick_off_async_update();
            return Ok(self.snapshot());
        }

        let _guard = self.update_lock.lock().map_err(|_| Error::Cancelled)?;
        self.update_internal(false)?;
        Ok(self.snapshot())
    }

    /// Spawn a background refresh unless one is already in flight. A double-spawn race is
    /// harmless (spec §9 open question): the second task finds `update_lock` held and returns.
    fn kick_off_async_update(self: &Arc<Self>) {
        if self
            .async_inflight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("async snapshot update already in flight, skipping kick-off");
            return;
        }

        let cache = Arc::clone(self);
        self.executor.spawn(async move { cache.try_update_async() });
    }

    /// `tryUpdate(async=true)`: non-blocking `try_lock`; if another updater is active, just
    /// return rather than waiting for it.
    fn try_update_async(&self) {
        match self.update_lock.try_lock() {
            Ok(_guard) => {
                if let Err(err) = self.update_internal(true) {
                    tracing::warn!(error = %err, "async snapshot refresh failed, will retry on next sync update");
                }
            }
            Err(_) => {
                tracing::debug!("update_lock held by another updater, async refresh skipped");
            }
        }
        self.async_inflight.store(false, Ordering::Release);
    }

    /// `updateInternal(async)` (spec §4.5). Caller must hold `update_lock`.
    fn update_internal(&self, is_async: bool) -> DeltaResult<()> {
        let result = self.build_current_snapshot();

        let new_snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_file_not_found() => {
                tracing::debug!(
                    is_async,
                    "log directory vanished underneath the cache, publishing InitialSnapshot"
                );
                Snapshot::initial()
            }
            Err(err) => return Err(err),
        };

        let current = self.current.read().unwrap().clone();
        if same_materialized_state(&current, &new_snapshot) {
            self.last_update_timestamp_ms
                .store(now_millis(), Ordering::Release);
            return Ok(());
        }

        if current.version_raw() >= 0 && current.table_id() != new_snapshot.table_id() {
            let observation = TableIdentityChanged {
                old_table_id: current.table_id(),
                new_table_id: new_snapshot.table_id(),
                new_version: new_snapshot.version(),
            };
            tracing::warn!(
                old_table_id = %observation.old_table_id,
                new_table_id = %observation.new_table_id,
                new_version = observation.new_version,
                "table identity changed across refresh"
            );
        }

        *self.current.write().unwrap() = Arc::new(new_snapshot);
        self.last_update_timestamp_ms
            .store(now_millis(), Ordering::Release);
        Ok(())
    }

    /// Build a fresh snapshot from the current hint, with no version ceiling -- shared by both
    /// cache init and every refresh.
    fn build_current_snapshot(&self) -> DeltaResult<Snapshot> {
        let hint_version = {
            let current = self.current.read().unwrap();
            current.checkpoint_version_hint()
        };
        self.build_snapshot_at(hint_version, None)
    }

    fn build_snapshot_at(
        &self,
        checkpoint_hint: Option<Version>,
        version_to_load: Option<Version>,
    ) -> DeltaResult<Snapshot> {
        let builder = LogSegmentBuilder::new(self.storage.as_ref(), self.log_root.clone());
        let segment = builder.build(checkpoint_hint, version_to_load)?;
        let factory = SnapshotFactory::new(self.storage.as_ref(), self.config);
        factory.create_with_retry(segment, |snapshot_version, max_exclusive_ckpt| {
            builder.build_with_exclusive_ceiling(snapshot_version, max_exclusive_ckpt)
        })
    }

    /// `getSnapshotAt(version, commitTsHint?, checkpointHint?)` (spec §4.5): a point-in-time read
    /// that never mutates cache state.
    pub fn get_snapshot_at(
        &self,
        version: Version,
        checkpoint_hint: Option<Version>,
    ) -> DeltaResult<Snapshot> {
        let current = self.snapshot();
        if current.version() == version && !current.is_initial() {
            return Ok((*current).clone());
        }

        let starting_hint = match checkpoint_hint {
            Some(hint) if hint <= version => Some(hint),
            _ => CheckpointSelector::find_last_complete_before(
                self.storage.as_ref(),
                &self.log_root,
                version,
                None,
            )?
            .map(|(instance, _)| instance.version),
        };

        self.build_snapshot_at(starting_hint, Some(version))
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::ObjectStore as _;
    use std::collections::HashMap;
    use test_log::test;
    use test_utils::{add_commit, delta_path_for_version, genesis_actions, storage_handler_setup, test_executor};

    #[test]
    fn empty_directory_collapses_to_initial_snapshot() {
        let (_store, handler, log_root) = storage_handler_setup();
        let cache = SnapshotCache::try_new(
            log_root,
            handler,
            test_executor(),
            SnapshotCacheConfig::from_raw(&HashMap::new()),
        )
        .unwrap();
        assert!(cache.snapshot().is_initial());
    }

    /// Spec §8 S6: the `_delta_log` directory is deleted and recreated with a fresh `tableId`.
    /// `update` must publish the new snapshot rather than erroring, merely observing the identity
    /// change (spec §4.5 step 4, §7 `TableIdentityChanged`).
    #[test]
    fn table_identity_change_is_observed_without_erroring() {
        let (store, storage, log_root) = storage_handler_setup();
        futures::executor::block_on(async {
            add_commit(store.as_ref(), 0, genesis_actions()).await.unwrap();
            add_commit(store.as_ref(), 1, genesis_actions()).await.unwrap();
        });

        let cache = Arc::new(
            SnapshotCache::try_new(
                log_root,
                storage,
                test_executor(),
                SnapshotCacheConfig::default(),
            )
            .unwrap(),
        );
        let first = cache.update(false).unwrap();
        assert!(!first.is_initial());
        let old_table_id = first.table_id();

        futures::executor::block_on(async {
            store.delete(&delta_path_for_version(0, "json")).await.unwrap();
            store.delete(&delta_path_for_version(1, "json")).await.unwrap();
            add_commit(store.as_ref(), 0, genesis_actions()).await.unwrap();
        });

        let second = cache.update(false).unwrap();
        assert!(!second.is_initial());
        assert_ne!(second.table_id(), old_table_id);
    }
}
