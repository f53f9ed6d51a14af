//! Symbolic-execution driven recovery of instruction successors.
//!
//! `ExecutionController` runs an `Engine` either undirected, collecting the
//! successors of one instruction, or directed along a `PathSet`, pruning
//! every state that leaves all candidate paths and collecting the
//! successors found at the end of each path.

pub mod address;
pub mod aggregator;
pub mod cli;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod path;
pub mod plugins;
pub mod report;
pub mod session;
pub mod tracker;

pub use address::Address;
pub use controller::ExecutionController;
pub use error::{Result, SuccError};
pub use path::{Path, PathId, PathSet};
