//! Shared key-value cache, owned by the host deployment. Values are
//! serialized JSON strings; entries expire after the TTL passed on write.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use error_stack::ResultExt;

use crate::core::errors::{CustomResult, StorageError};

#[async_trait::async_trait]
pub trait CacheInterface: Send + Sync {
    async fn get_key(&self, key: &str) -> CustomResult<Option<String>, StorageError>;

    async fn set_key_with_expiry(
        &self,
        key: &str,
        value: String,
        seconds: u64,
    ) -> CustomResult<(), StorageError>;
}

pub async fn get_and_deserialize_key<T>(
    cache: &dyn CacheInterface,
    key: &str,
) -> CustomResult<Option<T>, StorageError>
where
    T: serde::de::DeserializeOwned,
{
    match cache.get_key(key).await? {
        Some(value) => serde_json::from_str(&value)
            .change_context(StorageError::DeserializationFailed)
            .map(Some),
        None => Ok(None),
    }
}

pub async fn serialize_and_set_key_with_expiry<T>(
    cache: &dyn CacheInterface,
    key: &str,
    value: &T,
    seconds: u64,
) -> CustomResult<(), StorageError>
where
    T: serde::Serialize,
{
    let serialized =
        serde_json::to_string(value).change_context(StorageError::SerializationFailed)?;
    cache.set_key_with_expiry(key, serialized, seconds).await
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache store. Expired entries are dropped lazily on read
/// and overwritten on the next set of the same key.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheInterface for InMemoryCacheStore {
    async fn get_key(&self, key: &str) -> CustomResult<Option<String>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::CouldNotAcquireLock)?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set_key_with_expiry(
        &self,
        key: &str,
        value: String,
        seconds: u64,
    ) -> CustomResult<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::CouldNotAcquireLock)?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + Duration::from_secs(seconds),
            },
        );
        Ok(())
    }
}
