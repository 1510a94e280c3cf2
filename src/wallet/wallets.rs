use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Resolves an address to the key pair that controls it.
pub trait KeyStore {
    fn resolve(&self, address: &str) -> Result<&Wallet>;
}

/// Address-keyed wallet collection, optionally backed by a file.
#[derive(Default)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    path: Option<PathBuf>,
}

impl Wallets {
    /// An empty, memory-only collection.
    pub fn new() -> Wallets {
        Wallets::default()
    }

    /// Loads the collection stored at `path`; a missing file yields an empty one.
    pub fn load(path: impl AsRef<Path>) -> Result<Wallets> {
        let path = path.as_ref().to_path_buf();
        let mut wallets = Wallets {
            wallets: HashMap::new(),
            path: Some(path.clone()),
        };
        if !path.exists() {
            return Ok(wallets);
        }

        let mut file = File::open(&path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        wallets.wallets = deserialize(&buf)?;
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save()?;
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// Writes the collection back to its file. No-op for memory-only collections.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes = serialize(&self.wallets)?;
        writer.write_all(wallets_bytes.as_slice())?;
        writer.flush()?;
        log::debug!(
            "Saved {} wallets to {}",
            self.wallets.len(),
            path.display()
        );
        Ok(())
    }
}

impl KeyStore for Wallets {
    fn resolve(&self, address: &str) -> Result<&Wallet> {
        self.get_wallet(address)
            .ok_or_else(|| LedgerError::NotFound(format!("No wallet for {address}")))
    }
}
