//! # neighbor-bench
//!
//! Command-line driver for the neighbor-node latency harness.
//!
//! The binary in `main.rs` only sets up logging and hands the parsed
//! arguments to [`cli::execute`]; everything else lives here so the
//! integration tests can drive it in-process.

pub mod cli;
