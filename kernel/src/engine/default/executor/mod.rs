//! The async-execution seam for background snapshot refreshes (spec §5, §9). Grounded on
//! `delta-kernel-rs`'s `engine::default::executor::TaskExecutor`, which every example binary and
//! `test-utils` inject a concrete (usually Tokio-backed) implementation of.

pub mod tokio;

/// Runs fire-and-forget background work. [`crate::snapshot::cache::SnapshotCache`]'s async
/// `update` path uses this to offload a rebuild without blocking the caller.
///
/// Implementations must tolerate the task never running to completion (process shutdown, runtime
/// drop) -- a dropped async update simply means the cache stays at its last published snapshot.
pub trait TaskExecutor: Send + Sync + 'static {
    fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static;
}
