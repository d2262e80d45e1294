// In-memory token storage

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::TokenStorage;

static SHARED: Lazy<Arc<MemoryTokenStorage>> = Lazy::new(|| Arc::new(MemoryTokenStorage::new()));

/// Process-local token storage; contents are lost on exit.
///
/// This is the fallback when no storage is configured, so code running
/// outside a browser-like environment never silently depends on platform
/// persistence being available.
#[derive(Default)]
pub struct MemoryTokenStorage {
    entries: DashMap<String, String>,
}

impl MemoryTokenStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Process-wide instance used as the default token storage
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Number of stored tokens
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the store holds no tokens
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, token: &str, key: &str) -> Result<()> {
        self.entries.insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let store = MemoryTokenStorage::new();

        store.set("abc123", "session").unwrap();
        let value = tokio_test::block_on(store.get("session")).unwrap();
        assert_eq!(value.as_deref(), Some("abc123"));

        store.delete("session").unwrap();
        let value = tokio_test::block_on(store.get("session")).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_missing_key_is_absent_not_error() {
        let store = MemoryTokenStorage::new();
        let value = tokio_test::block_on(store.get("never-set")).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let store = MemoryTokenStorage::new();
        store.delete("never-set").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryTokenStorage::new();
        store.set("old", "k").unwrap();
        store.set("new", "k").unwrap();

        let value = tokio_test::block_on(store.get("k")).unwrap();
        assert_eq!(value.as_deref(), Some("new"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_shared_instance_is_stable() {
        let a = MemoryTokenStorage::shared();
        let b = MemoryTokenStorage::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
