//! # Tubes - Cooperative Flow Control for In-Process Dataflow
//!
//! `tubes` connects producers and consumers of items with backpressure that
//! flows the other way. A stage pulls items at whatever rate its downstream
//! can accept, and the upstream is paused and resumed transparently.
//!
//! ## Core Concepts
//!
//! ### Fount and Drain
//!
//! A [`Fount`] produces items and a [`Drain`] consumes them. A fount is
//! connected to a drain with [`Fount::flow_to`]; the drain can ask the fount
//! to slow down with [`Fount::pause_flow`], which returns a [`Pause`] token,
//! or to give up entirely with [`Fount::stop_flow`]. The end of a flow is
//! announced with [`Drain::flow_stopped`] and a [`StopReason`].
//!
//! ### Tube and Siphon
//!
//! A [`Tube`] is a transformation stage written without any knowledge of
//! flow control: its hooks just return [`Outputs`]. A [`Siphon`] wraps a
//! tube into a drain/fount pair and takes care of buffering, pausing,
//! reentrancy and failure handling.
//!
//! ### Fans
//!
//! [`In`] merges many flows into one, [`Out`] broadcasts one flow to many,
//! and [`Thru`] scatters every item to several sub-pipelines and gathers
//! their outputs back into one flow.
//!
//! ## Item and Pause Flow
//!
//! ```text
//!                     receive(item), flow_stopped(reason)
//!           ──────────────────────────────────────────────────────>
//!   +--------+      +--------+      +--------+      +--------+      +-------+
//!   | Source |─────>| Siphon |─────>|  Out   |─┬───>| Siphon |─┬───>| Sink  |
//!   +--------+      +--------+      +--------+ │    +--------+ │ In +-------+
//!                                              └───>| Siphon |─┘
//!                                                   +--------+
//!           <──────────────────────────────────────────────────────
//!                       pause_flow(), unpause(), stop_flow()
//! ```
//!
//! ## Example: Doubling Pipeline
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tubes::{BoxError, Drain, Fount, NextFount, Outputs, Result, Siphon, StopReason, Tube};
//!
//! struct Doubler;
//!
//! impl Tube for Doubler {
//!     type Input = u32;
//!     type Output = u32;
//!
//!     fn received(&mut self, item: u32) -> std::result::Result<Outputs<u32>, BoxError> {
//!         Ok(Outputs::from(vec![item, item]))
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Collect {
//!     items: RefCell<Vec<u32>>,
//! }
//!
//! impl Drain<u32> for Collect {
//!     fn fount(&self) -> Option<Rc<dyn Fount<u32>>> {
//!         None
//!     }
//!     fn flowing_from(&self, _fount: Option<Rc<dyn Fount<u32>>>) -> Result<Option<NextFount>> {
//!         Ok(None)
//!     }
//!     fn receive(&self, item: u32) {
//!         self.items.borrow_mut().push(item);
//!     }
//!     fn flow_stopped(&self, _reason: StopReason) {}
//! }
//!
//! let siphon = Siphon::new(Doubler);
//! let sink = Rc::new(Collect::default());
//! siphon.as_fount().flow_to(Some(sink.clone()))?;
//!
//! siphon.as_drain().receive(1);
//! siphon.as_drain().receive(2);
//! assert_eq!(*sink.items.borrow(), vec![1, 1, 2, 2]);
//! # Ok::<(), tubes::Error>(())
//! ```
//!
//! ## Threading
//!
//! Everything is single-threaded: pipeline objects are `Rc`-shared and every
//! call runs to completion before the next one starts. Asynchronous work
//! enters a flow as a pending [`Value`]; see the `tubes-rt` crate for running
//! futures on a local executor and feeding their results back in.

#![warn(rust_2018_idioms)]
#![allow(dead_code)]
#![warn(missing_docs)]

// ========================================
// Module Declarations
// ========================================

/// Buffered sequence queue used by siphons
pub(crate) mod buffer;

/// One-shot values resolved out of band
pub(crate) mod deferred;

/// Error and stop reason types
pub(crate) mod error;

/// Fan-in, fan-out and scatter/gather
pub(crate) mod fan;

/// Fount and drain traits plus attachment helpers
pub(crate) mod flow;

/// Pause tokens and pause bookkeeping
pub(crate) mod pause;

/// The tube-to-flow adapter
pub(crate) mod siphon;

/// The tube trait and its outputs
pub(crate) mod tube;

// ========================================
// Public Exports
// ========================================

/// Pending values and their resolvers
pub use deferred::{Deferred, Resolver, deferred};

/// Errors, failures and stop reasons
pub use error::{BoxError, Error, Failure, Result, StopReason};

/// Fan components
pub use fan::{In, Out, Thru};

/// Flow traits and attachment helpers
pub use flow::{
    Drain, DrainSlot, Fount, FountSlot, NextFount, begin_flowing_from, begin_flowing_to, same,
};

/// Pause tokens and pause state
pub use pause::{FlowState, Pause};

/// Siphon adapter
pub use siphon::Siphon;

/// Tube trait and outputs
pub use tube::{Outputs, Sequence, Tube, Value};
