//! # UTXO Ledger - a single-node proof-of-work ledger
//!
//! An append-only chain of mined blocks carrying UTXO transactions, persisted
//! in an embedded key-value store.
//!
//! ## What It Does
//! - **Chain**: every block commits to its predecessor's digest and a Merkle
//!   root over its transactions, and is mined against a fixed difficulty target
//! - **UTXO Model**: transactions consume earlier outputs and create new ones
//!   locked to address hashes
//! - **Signatures**: ECDSA P-256 over the transaction id, one signature per input
//! - **Wallets**: key pairs with Base58Check addresses, kept in a local file
//!
//! ## How The Code Is Organized
//! - `core/`: blocks, transactions, Merkle root, proof-of-work, the ledger engine
//! - `storage/`: the scoped key-value contract with sled and in-memory backends
//! - `wallet/`: key management and address encoding
//! - `config/`: environment-driven settings for the binary
//! - `utils/`: hashing, signing, and encoding helpers
//! - `cli/`: command-line argument parsing
//!
//! ## Where To Start
//! 1. `main.rs` for the commands
//! 2. `core/ledger.rs` for appending blocks and the UTXO queries
//! 3. `core/transaction.rs` for building, signing, and verifying transfers

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use crate::core::{
    Block, BlockSummary, Ledger, LedgerIterator, MerkleTree, PriorTransactions, ProofOfWork,
    TXInput, TXOutput, Transaction, UnspentOutput, SUBSIDY, TARGET_BITS,
};
pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use error::{LedgerError, Result};
pub use storage::{Bucket, MemoryStorage, SledStorage, Storage};
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest,
};
pub use wallet::{
    address_to_pub_key_hash, convert_address, hash_pub_key, validate_address, KeyStore, Wallet,
    Wallets, ADDRESS_CHECK_SUM_LEN,
};
