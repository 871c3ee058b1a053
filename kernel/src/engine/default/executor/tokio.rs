//! A process-wide, lazily-initialized `tokio` background executor (spec §5: "typical size: 8
//! threads, cached, named"; spec §9: "a test harness must accept an injected executor to avoid
//! shared state across tests").

use std::sync::Arc;

use super::TaskExecutor;

/// A background executor backed by a dedicated multi-thread `tokio` runtime.
///
/// Each instance owns its own runtime, so production code typically shares one instance (built
/// once, lazily, and handed to every [`crate::engine::default::DefaultEngine`]) while tests
/// construct a fresh instance per test to avoid cross-test interference.
pub struct TokioBackgroundExecutor {
    runtime: Arc<::tokio::runtime::Runtime>,
}

impl TokioBackgroundExecutor {
    pub fn new() -> Self {
        let runtime = ::tokio::runtime::Builder::new_multi_thread()
            .worker_threads(8)
            .thread_name("delta-snapshot-async")
            .enable_all()
            .build()
            .expect("failed to build background tokio runtime");
        Self {
            runtime: Arc::new(runtime),
        }
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for TokioBackgroundExecutor {
    fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(future);
    }
}
