//! Shared helpers for unit tests
//!
//! In-memory and temporary sled-backed ledgers, plus memory-only wallets.

pub mod test_utils;

pub use test_utils::*;
