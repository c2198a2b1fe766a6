//! # Tubes Runtime - Local Executors for Pending Values
//!
//! `tubes-rt` runs the asynchronous side of a `tubes` pipeline. A pipeline is
//! single-threaded, so everything here is built on thread-local executors:
//! smol's `LocalExecutor` or tokio's `LocalSet`, picked at compile time.
//!
//! The bridge into a pipeline is [`spawn_deferred`]: it spawns a future on the
//! current executor and hands back a [`Deferred`] that a tube can return as a
//! pending value. When the future completes, the siphon holding the value
//! delivers it in place and resumes its flow. [`spawn_pending`] also returns
//! the [`Task`] handle, so the work can be cancelled; the siphon then sees
//! the value rejected and fails its flow.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tubes::{BoxError, Outputs, Tube};
//! use tubes_rt::{LocalExecutorBuilder, spawn_deferred};
//!
//! struct Resolve;
//!
//! impl Tube for Resolve {
//!     type Input = String;
//!     type Output = usize;
//!
//!     fn received(&mut self, host: String) -> Result<Outputs<usize>, BoxError> {
//!         Ok(Outputs::pending(spawn_deferred(async move { host.len() })))
//!     }
//! }
//!
//! LocalExecutorBuilder::default().name("resolver").run(async {
//!     // build and drive the pipeline here
//! });
//! ```
//!
//! ## Feature Flags
//!
//! - **`runtime-smol`** (default): Use smol's LocalExecutor
//! - **`runtime-tokio`**: Use tokio's LocalSet
//!
//! **Note:** Only one runtime feature can be enabled at a time.

#![warn(rust_2018_idioms)]
#![allow(dead_code)]
#![warn(missing_docs)]

use log::debug;
use std::future::Future;
use tubes::{BoxError, Deferred, deferred};

// =============================================================================
// Smol-based implementation
// =============================================================================

#[cfg(feature = "runtime-smol")]
mod runtime_smol;

#[cfg(feature = "runtime-smol")]
pub use runtime_smol::{LocalExecutorBuilder, Task, yield_local};
#[cfg(feature = "runtime-smol")]
use runtime_smol::spawn;

// =============================================================================
// Tokio-based implementation
// =============================================================================

#[cfg(feature = "runtime-tokio")]
mod runtime_tokio;

#[cfg(feature = "runtime-tokio")]
pub use runtime_tokio::{LocalExecutorBuilder, Task, yield_local};
#[cfg(feature = "runtime-tokio")]
use runtime_tokio::spawn;

// =============================================================================
// Compile-time guards
// =============================================================================

// Compile error if neither or both features are enabled
#[cfg(not(any(feature = "runtime-smol", feature = "runtime-tokio")))]
compile_error!("Either 'runtime-smol' or 'runtime-tokio' feature must be enabled");

#[cfg(all(feature = "runtime-smol", feature = "runtime-tokio"))]
compile_error!(
    "Only one runtime feature can be enabled at a time: 'runtime-smol' or 'runtime-tokio'"
);

// =============================================================================
// Pending values
// =============================================================================

/// Runs `future` on the current executor and returns its output as a pending
/// value, along with the [`Task`] producing it.
///
/// Cancelling the task, or the executor shutting down before it completes,
/// rejects the value.
///
/// # Panics
///
/// Panics if called outside of [`LocalExecutorBuilder::run`].
pub fn spawn_pending<T: 'static>(
    future: impl Future<Output = T> + 'static,
) -> (Deferred<T>, Task) {
    let (value, resolver) = deferred();
    let task = spawn(async move {
        resolver.resolve(future.await);
    });
    (value, task)
}

/// Like [`spawn_pending`], for work that is never cancelled.
pub fn spawn_deferred<T: 'static>(future: impl Future<Output = T> + 'static) -> Deferred<T> {
    let (value, _task) = spawn_pending(future);
    value
}

/// Like [`spawn_deferred`], for futures that can fail.
///
/// An `Err` rejects the pending value, which fails the flow that holds it.
pub fn spawn_fallible<T, E>(
    future: impl Future<Output = Result<T, E>> + 'static,
) -> Deferred<T>
where
    T: 'static,
    E: Into<BoxError> + 'static,
{
    let (value, resolver) = deferred();
    let _task = spawn(async move {
        match future.await {
            Ok(item) => resolver.resolve(item),
            Err(err) => {
                let err: BoxError = err.into();
                debug!("pending value rejected: {}", err);
                resolver.reject(err);
            }
        }
    });
    value
}
