//! Command-line interface
//!
//! Argument parsing for the ledger binary.

pub mod commands;

pub use commands::{Command, Opt};
