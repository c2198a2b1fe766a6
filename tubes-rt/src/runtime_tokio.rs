//! Pending values on tokio's `LocalSet`.

use log::{debug, trace};
use scoped_tls::scoped_thread_local;
use std::future::Future;
use tokio::task::{JoinHandle, LocalSet};

scoped_thread_local!(static CURRENT: LocalSet);

/// Handle to the task producing a pending value.
///
/// Dropping the handle leaves the task running; [`Task::cancel`] stops it
/// and rejects the value it was going to produce.
pub struct Task {
    inner: JoinHandle<()>,
}

impl Task {
    /// Whether the task has produced its value (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Stops the task. The pending value it feeds is rejected, failing the
    /// flow that holds it, once the runtime drops the aborted future.
    pub fn cancel(self) {
        trace!("cancelling pending value task");
        self.inner.abort();
    }
}

pub(crate) fn spawn(future: impl Future<Output = ()> + 'static) -> Task {
    if !CURRENT.is_set() {
        panic!("pending values must be spawned inside `LocalExecutorBuilder::run`");
    }
    CURRENT.with(|local_set| Task {
        inner: local_set.spawn_local(future),
    })
}

/// Configures and runs the tokio `LocalSet` that pending values are spawned
/// on.
#[derive(Debug, Default)]
pub struct LocalExecutorBuilder {
    name: String,
}

impl LocalExecutorBuilder {
    /// Creates a new LocalExecutorBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the executor, for logs.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// Drives `f` to completion on a current-thread runtime, running any
    /// pending value tasks it spawns along the way.
    ///
    /// # Panics
    ///
    /// Panics if the tokio runtime cannot be built.
    pub fn run<T>(self, f: impl Future<Output = T>) -> T {
        debug!("executor {:?} starting on tokio", self.name);
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => panic!("failed to build tokio runtime for {:?}: {}", self.name, err),
        };
        let local_set = LocalSet::new();
        let output = CURRENT.set(&local_set, || {
            runtime.block_on(local_set.run_until(f))
        });
        debug!("executor {:?} finished", self.name);
        output
    }
}

/// Gives spawned tasks a chance to run, so resolved pending values get
/// delivered.
pub async fn yield_local() {
    tokio::task::yield_now().await
}
