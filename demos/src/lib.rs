//! # Tubes Demos
//!
//! This crate contains examples demonstrating how to use the tubes crates.
//!
//! ## Running Examples
//!
//! Run an example with:
//!
//! ```bash
//! cargo run -p demos --example doubling -- --debug --log-level trace
//! ```
//!
//! Or with a specific runtime:
//!
//! ```bash
//! cargo run -p demos --example scatter_gather --no-default-features --features runtime-tokio
//! ```

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

// Helper modules that examples can use
pub mod helpers;
