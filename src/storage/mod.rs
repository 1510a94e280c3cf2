//! Key-value storage behind the ledger
//!
//! The ledger only needs `get` and `put` inside atomic scopes. Read scopes
//! never write; write scopes apply all of their puts or none of them.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

use crate::error::Result;

/// A bucket-like view of the store, valid for the duration of one scope.
pub trait Bucket {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Atomic, isolated access to a key-value store.
///
/// A scope closure may run more than once if the backend retries a conflicting
/// transaction, so it must not have side effects outside the bucket.
pub trait Storage {
    fn read_scope<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>;

    fn write_scope<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>;
}
