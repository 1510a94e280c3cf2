//! Configuration management
//!
//! Locations of the ledger database and the wallet file, taken from the
//! environment. Only the binary reads the global config; library types are
//! handed their storage explicitly.

pub mod settings;

pub use settings::{Config, GLOBAL_CONFIG};
