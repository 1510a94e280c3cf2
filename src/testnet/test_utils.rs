//! Test utilities for ledger testing

use crate::core::Ledger;
use crate::error::{LedgerError, Result};
use crate::storage::{MemoryStorage, SledStorage};
use crate::wallet::Wallets;
use tempfile::TempDir;

/// A valid version-0 address nobody in the tests holds a key for.
pub const TEST_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| LedgerError::Io(e.to_string()))
}

/// Create an in-memory ledger whose genesis reward goes to `address`
pub fn create_test_ledger(address: &str) -> Result<Ledger<MemoryStorage>> {
    Ledger::create(MemoryStorage::new(), address)
}

/// Create a sled-backed ledger in a temporary directory
pub fn create_test_sled_ledger(address: &str) -> Result<(Ledger<SledStorage>, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let storage = SledStorage::open(temp_dir.path().join("test_ledger"))?;
    let ledger = Ledger::create(storage, address)?;
    Ok((ledger, temp_dir))
}

/// Create memory-only test wallets
pub fn create_test_wallets(count: usize) -> Result<(Wallets, Vec<String>)> {
    let mut wallets = Wallets::new();
    let mut addresses = Vec::new();

    for _ in 0..count {
        let address = wallets.create_wallet()?;
        addresses.push(address);
    }

    Ok((wallets, addresses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_ledger() {
        let ledger = create_test_ledger(TEST_ADDRESS).unwrap();
        assert_eq!(ledger.iterator().count(), 1);
        assert!(ledger.verify_chain().unwrap());
    }

    #[test]
    fn test_create_test_sled_ledger() {
        let (ledger, _temp_dir) = create_test_sled_ledger(TEST_ADDRESS).unwrap();
        assert!(ledger.verify_chain().unwrap());
    }

    #[test]
    fn test_create_test_wallets() {
        let (_wallets, addresses) = create_test_wallets(5).unwrap();
        assert_eq!(addresses.len(), 5);

        // All addresses should be unique
        for i in 0..addresses.len() {
            for j in i + 1..addresses.len() {
                assert_ne!(addresses[i], addresses[j]);
            }
        }
    }
}
