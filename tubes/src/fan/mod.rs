//! # Fans - Merging, Splitting and Scatter/Gather
//!
//! - [`In`] merges many upstream flows into one downstream.
//! - [`Out`] broadcasts one upstream flow to many downstream branches.
//! - [`Thru`] combines the two around a set of sub-pipelines.
//!
//! Branches live in a small arena keyed by stable handles; broadcasts walk a
//! snapshot of handles, so a branch that detaches mid-broadcast is skipped
//! without disturbing delivery to the others.

mod branches;
mod fan_in;
mod fan_out;
mod thru;

pub use fan_in::In;
pub use fan_out::Out;
pub use thru::Thru;
