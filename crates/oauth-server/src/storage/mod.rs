//! Storage for authorization codes and tokens
//!
//! Both stores are written against [`KeyValueStore`], a get/put/compare-and-swap
//! interface that an in-process map or a shared external store can implement.
//! Every read-modify-write on a record goes through `compare_and_swap`, so
//! correctness under concurrent callers does not depend on the backend
//! offering anything stronger.

mod codes;
mod tokens;

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use thiserror::Error;

pub use codes::{AuthorizationCode, CodeStore};
pub use tokens::{AccessToken, RefreshToken, Revoked, TokenStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-value backend for one kind of record
#[async_trait]
pub trait KeyValueStore<V>: Send + Sync
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Insert or overwrite
    async fn put(&self, key: &str, value: V) -> Result<()>;

    /// Remove and return the previous value
    async fn remove(&self, key: &str) -> Result<Option<V>>;

    /// Replace the value at `key` with `new` only if it still equals `expected`
    ///
    /// Returns false (and changes nothing) if the key is missing or holds a
    /// different value.
    async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool>;

    /// Drop every entry for which `keep` returns false; returns the dropped entries
    async fn retain(
        &self,
        keep: &(dyn for<'a> Fn(&'a V) -> bool + Send + Sync),
    ) -> Result<Vec<(String, V)>>;
}

/// Single-process backend
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Critical sections never leave the map half-updated, so a poisoned lock
    // is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> KeyValueStore<V> for MemoryStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: V) -> Result<()> {
        self.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<V>> {
        Ok(self.write().remove(key))
    }

    async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool> {
        let mut entries = self.write();
        match entries.get_mut(key) {
            Some(current) if current == expected => {
                *current = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn retain(
        &self,
        keep: &(dyn for<'a> Fn(&'a V) -> bool + Send + Sync),
    ) -> Result<Vec<(String, V)>> {
        let mut entries = self.write();
        let mut dropped = Vec::new();
        entries.retain(|k, v| {
            if keep(v) {
                true
            } else {
                dropped.push((k.clone(), v.clone()));
                false
            }
        });
        Ok(dropped)
    }
}

/// Backend wrapper whose operations can be made to fail on demand
#[cfg(test)]
pub(crate) mod flaky {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    pub(crate) struct FlakyStore<V> {
        pub inner: MemoryStore<V>,
        pub fail_put: AtomicBool,
        pub fail_remove: AtomicBool,
        pub fail_cas: AtomicBool,
    }

    impl<V> FlakyStore<V> {
        pub fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_put: AtomicBool::new(false),
                fail_remove: AtomicBool::new(false),
                fail_cas: AtomicBool::new(false),
            }
        }
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }

    #[async_trait]
    impl<V> KeyValueStore<V> for FlakyStore<V>
    where
        V: Clone + PartialEq + Send + Sync + 'static,
    {
        async fn get(&self, key: &str) -> Result<Option<V>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: V) -> Result<()> {
            check(&self.fail_put)?;
            self.inner.put(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<Option<V>> {
            check(&self.fail_remove)?;
            self.inner.remove(key).await
        }

        async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool> {
            check(&self.fail_cas)?;
            self.inner.compare_and_swap(key, expected, new).await
        }

        async fn retain(
            &self,
            keep: &(dyn for<'a> Fn(&'a V) -> bool + Send + Sync),
        ) -> Result<Vec<(String, V)>> {
            check(&self.fail_remove)?;
            self.inner.retain(keep).await
        }
    }
}
