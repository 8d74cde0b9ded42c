//! Persisted session record: the last connected account and provider kind.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use eyre::{eyre, Result};
use log::debug;

use super::provider::ProviderKind;

const ACCOUNT_KEY: &str = "session.account";
const PROVIDER_KIND_KEY: &str = "session.provider_kind";

/// What survives a restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub account: String,
    pub provider_kind: ProviderKind,
}

/// Key-value storage for the session record
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// Reads the record; missing or unreadable entries mean there is none.
    async fn load(&self) -> Option<SessionRecord> {
        let account = self.get(ACCOUNT_KEY).await.ok().flatten()?;
        let kind = self.get(PROVIDER_KIND_KEY).await.ok().flatten()?;

        let provider_kind = match kind.parse::<ProviderKind>() {
            Ok(ProviderKind::None) | Err(_) => {
                debug!("wallet::store: ignoring record with provider kind {kind:?}");
                return None;
            }
            Ok(kind) => kind,
        };
        if account.is_empty() {
            return None;
        }

        Some(SessionRecord {
            account,
            provider_kind,
        })
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.set(ACCOUNT_KEY, &record.account).await?;
        self.set(PROVIDER_KIND_KEY, &record.provider_kind.to_string())
            .await
    }

    async fn clear(&self) -> Result<()> {
        self.remove(ACCOUNT_KEY).await?;
        self.remove(PROVIDER_KIND_KEY).await
    }
}

/// Store backed by an on-disk content addressed cache
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: String,
}

impl CacheStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SessionStore for CacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match cacache::read(&self.dir, key).await {
            Ok(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            Err(cacache::Error::EntryNotFound(..)) => Ok(None),
            Err(e) => Err(eyre!("reading {key}: {e}")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        cacache::write(&self.dir, key, value.as_bytes()).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        cacache::remove(&self.dir, key).await?;
        Ok(())
    }
}

/// Store that forgets everything when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|e| eyre!("store lock poisoned: {e}"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|e| eyre!("store lock poisoned: {e}"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|e| eyre!("store lock poisoned: {e}"))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            account: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".to_string(),
            provider_kind: ProviderKind::Coinbase,
        }
    }

    #[tokio::test]
    async fn test_memory_store_save_load_clear() {
        let store = MemoryStore::default();
        assert_eq!(store.load().await, None);

        store.save(&record()).await.unwrap();
        assert_eq!(store.load().await, Some(record()));

        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
        // Clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_ignores_unknown_kind() {
        let store = MemoryStore::default();
        store.set(ACCOUNT_KEY, "0xabc").await.unwrap();
        store.set(PROVIDER_KIND_KEY, "walletconnect").await.unwrap();
        assert_eq!(store.load().await, None);

        store.set(PROVIDER_KIND_KEY, "none").await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_cache_store_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();

        CacheStore::new(path.clone()).save(&record()).await.unwrap();
        // A fresh handle sees what the previous one wrote
        let store = CacheStore::new(path);
        assert_eq!(store.load().await, Some(record()));

        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
    }
}
