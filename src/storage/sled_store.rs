use crate::error::{LedgerError, Result};
use crate::storage::{Bucket, Storage};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";

/// Sled-backed store; every scope is a sled transaction on the `blocks` tree.
#[derive(Clone)]
pub struct SledStorage {
    db: Db,
    tree: Tree,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<SledStorage> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {e}")))?;
        let tree = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Storage(format!("Failed to open blocks tree: {e}")))?;
        Ok(SledStorage { db, tree })
    }

    fn run_scope<T, F>(&self, writable: bool, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>,
    {
        self.tree
            .transaction(|tx_tree| {
                let bucket = SledBucket {
                    tree: tx_tree,
                    writable,
                };
                f(&bucket).map_err(ConflictableTransactionError::Abort)
            })
            .map_err(|e: TransactionError<LedgerError>| match e {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => {
                    LedgerError::Storage(format!("Transaction failed: {err}"))
                }
            })
    }
}

impl Storage for SledStorage {
    fn read_scope<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>,
    {
        self.run_scope(false, f)
    }

    fn write_scope<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>,
    {
        let value = self.run_scope(true, f)?;
        self.db
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {e}")))?;
        Ok(value)
    }
}

struct SledBucket<'a> {
    tree: &'a TransactionalTree,
    writable: bool,
}

impl Bucket for SledBucket<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.tree
            .get(key)
            .map(|value| value.map(|v| v.to_vec()))
            .map_err(|e| LedgerError::Storage(format!("Failed to read key: {e}")))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(LedgerError::Storage(
                "Write attempted inside a read scope".to_string(),
            ));
        }
        self.tree
            .insert(key, value)
            .map(|_| ())
            .map_err(|e| LedgerError::Storage(format!("Failed to write key: {e}")))
    }
}
