//! Wallet management and key lookup
//!
//! Key pairs, Base58Check addresses and the `KeyStore` lookup the ledger
//! uses to find the key that controls an address.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_to_pub_key_hash, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
pub use wallets::{KeyStore, Wallets};
