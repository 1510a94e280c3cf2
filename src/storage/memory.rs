use crate::error::{LedgerError, Result};
use crate::storage::{Bucket, Storage};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

/// In-process store. Write scopes stage their puts and apply them on success.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    /// Number of stored keys, reserved tip key included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_map()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_map(&self) -> Result<RwLockReadGuard<'_, HashMap<Vec<u8>, Vec<u8>>>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Storage("Memory storage lock poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn read_scope<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>,
    {
        let map = self.read_map()?;
        let bucket = MemoryBucket {
            committed: &map,
            staged: None,
        };
        f(&bucket)
    }

    fn write_scope<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&dyn Bucket) -> Result<T>,
    {
        let mut map = self
            .inner
            .write()
            .map_err(|_| LedgerError::Storage("Memory storage lock poisoned".to_string()))?;
        let bucket = MemoryBucket {
            committed: &map,
            staged: Some(RefCell::new(HashMap::new())),
        };
        let value = f(&bucket)?;
        let staged = bucket.into_staged();
        map.extend(staged);
        Ok(value)
    }
}

struct MemoryBucket<'a> {
    committed: &'a HashMap<Vec<u8>, Vec<u8>>,
    staged: Option<RefCell<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryBucket<'_> {
    fn into_staged(self) -> HashMap<Vec<u8>, Vec<u8>> {
        self.staged.map(RefCell::into_inner).unwrap_or_default()
    }
}

impl Bucket for MemoryBucket<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = &self.staged {
            if let Some(value) = staged.borrow().get(key) {
                return Ok(Some(value.clone()));
            }
        }
        Ok(self.committed.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        match &self.staged {
            Some(staged) => {
                staged.borrow_mut().insert(key.to_vec(), value.to_vec());
                Ok(())
            }
            None => Err(LedgerError::Storage(
                "Write attempted inside a read scope".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_writes_visible_inside_scope() {
        let storage = MemoryStorage::new();
        let seen = storage
            .write_scope(|bucket| {
                bucket.put(b"a", b"1")?;
                bucket.get(b"a")
            })
            .unwrap();
        assert_eq!(seen, Some(b"1".to_vec()));
        assert_eq!(storage.len().unwrap(), 1);
    }

    #[test]
    fn test_failed_scope_applies_nothing() {
        let storage = MemoryStorage::new();
        let result: Result<()> = storage.write_scope(|bucket| {
            bucket.put(b"a", b"1")?;
            bucket.put(b"b", b"2")?;
            Err(LedgerError::Storage("disk full".to_string()))
        });
        assert!(result.is_err());
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_read_scope_rejects_put() {
        let storage = MemoryStorage::new();
        let result = storage.read_scope(|bucket| bucket.put(b"a", b"1"));
        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let storage = MemoryStorage::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = storage.inner.write().unwrap();
            panic!("poison the lock");
        }));

        assert!(matches!(storage.len(), Err(LedgerError::Storage(_))));
        let result = storage.read_scope(|bucket| bucket.get(b"a"));
        assert!(matches!(result, Err(LedgerError::Storage(_))));
    }
}
