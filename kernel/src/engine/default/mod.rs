//! The default, `object_store`-backed engine: a [`crate::StorageHandler`] plus a background
//! [`executor::TaskExecutor`], bundled together the way `delta-kernel-rs`'s `DefaultEngine`
//! bundles a storage handler with its handlers.

pub mod executor;
pub mod filesystem;

use std::sync::Arc;

use object_store::ObjectStore;

use self::executor::tokio::TokioBackgroundExecutor;
use self::executor::TaskExecutor;
use self::filesystem::ObjectStoreStorageHandler;
use crate::StorageHandler;

/// Bundles an `object_store`-backed [`StorageHandler`] with a [`TaskExecutor`] used to run
/// asynchronous snapshot refreshes off the caller's thread.
pub struct DefaultEngine<E: TaskExecutor> {
    storage: Arc<ObjectStoreStorageHandler>,
    executor: Arc<E>,
}

impl<E: TaskExecutor> DefaultEngine<E> {
    pub fn new(store: Arc<dyn ObjectStore>, executor: Arc<E>) -> Self {
        Self {
            storage: Arc::new(ObjectStoreStorageHandler::new(store)),
            executor,
        }
    }

    pub fn storage_handler(&self) -> Arc<dyn StorageHandler> {
        self.storage.clone()
    }

    pub fn executor(&self) -> Arc<E> {
        self.executor.clone()
    }
}

impl DefaultEngine<TokioBackgroundExecutor> {
    /// Convenience constructor using the process-wide background executor.
    pub fn new_with_background_executor(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, Arc::new(TokioBackgroundExecutor::new()))
    }
}
