//! Pending values on smol's `LocalExecutor`.

use log::{debug, trace};
use scoped_tls::scoped_thread_local;
use smol::LocalExecutor;
use std::future::Future;

scoped_thread_local!(static CURRENT: LocalExecutor<'_>);

/// Handle to the task producing a pending value.
///
/// Dropping the handle leaves the task running; [`Task::cancel`] stops it
/// and rejects the value it was going to produce.
pub struct Task {
    inner: Option<smol::Task<()>>,
}

impl Task {
    /// Whether the task has produced its value (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stops the task. The pending value it feeds is rejected, failing the
    /// flow that holds it.
    pub fn cancel(mut self) {
        if let Some(task) = self.inner.take() {
            trace!("cancelling pending value task");
            drop(task);
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(task) = self.inner.take() {
            task.detach();
        }
    }
}

pub(crate) fn spawn(future: impl Future<Output = ()> + 'static) -> Task {
    if !CURRENT.is_set() {
        panic!("pending values must be spawned inside `LocalExecutorBuilder::run`");
    }
    CURRENT.with(|executor| Task {
        inner: Some(executor.spawn(future)),
    })
}

/// Configures and runs the smol executor that pending values are spawned on.
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

    /// Drives `f` to completion on the current thread, running any pending
    /// value tasks it spawns along the way.
    pub fn run<T>(self, f: impl Future<Output = T>) -> T {
        debug!("executor {:?} starting on smol", self.name);
        let executor = LocalExecutor::new();
        let output = CURRENT.set(&executor, || {
            futures_lite::future::block_on(executor.run(f))
        });
        debug!("executor {:?} finished", self.name);
        output
    }
}

/// Runs every task that is ready, so resolved pending values get delivered
/// before this returns.
///
/// # Panics
///
/// Panics if called outside of [`LocalExecutorBuilder::run`].
pub async fn yield_local() {
    if !CURRENT.is_set() {
        panic!("`yield_local()` must be called inside `LocalExecutorBuilder::run`");
    }
    CURRENT.with(|executor| while executor.try_tick() {})
}
