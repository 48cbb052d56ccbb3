//! Async runtime utilities for tessel.
//!
//! Chunk operands run user code that may block, so the executor hands them
//! to tokio's blocking pool through [`JoinSet::spawn_blocking`].

use std::future::Future;

use common_error::{TesselError, TesselResult};
use tokio::runtime::Runtime;

/// Create a multi-threaded Tokio runtime for driving async code from sync callers.
pub fn get_runtime() -> TesselResult<Runtime> {
    Runtime::new().map_err(|e| TesselError::internal(format!("Failed to create runtime: {e}")))
}

/// Block on a future using a fresh runtime.
pub fn block_on<F: Future>(future: F) -> TesselResult<F::Output> {
    let runtime = get_runtime()?;
    Ok(runtime.block_on(future))
}

/// A handle to a set of spawned tasks.
pub struct JoinSet<T> {
    inner: tokio::task::JoinSet<T>,
}

impl<T: Send + 'static> JoinSet<T> {
    /// Create a new join set.
    pub fn new() -> Self {
        Self {
            inner: tokio::task::JoinSet::new(),
        }
    }

    /// Spawn a task into the set.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.inner.spawn(future);
    }

    /// Spawn a blocking closure into the set.
    pub fn spawn_blocking<F>(&mut self, f: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.inner.spawn_blocking(f);
    }

    /// Wait for the next task to complete.
    ///
    /// A panicked or cancelled task is reported as an `ExecutionError`.
    pub async fn join_next(&mut self) -> Option<TesselResult<T>> {
        self.inner.join_next().await.map(|joined| {
            joined.map_err(|e| TesselError::execution(format!("task join failed: {e}")))
        })
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the number of tasks in the set.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<T: Send + 'static> Default for JoinSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
