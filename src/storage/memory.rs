//! In-memory cache storage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStorage, check_cacheable};
use crate::error::{Error, Result};
use crate::request::{Request, Response};

type Store = BTreeMap<Request, Response>;

/// Cache storage kept in process memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: RwLock<BTreeMap<String, Store>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.stores.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()> {
        check_cacheable(request, &response)?;
        let mut stores = self.stores.write().await;
        let store = stores
            .get_mut(name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))?;
        store.insert(request.clone(), response);
        Ok(())
    }

    async fn remove(&self, name: &str, request: &Request) -> Result<bool> {
        Ok(self
            .stores
            .write()
            .await
            .get_mut(name)
            .is_some_and(|store| store.remove(request).is_some()))
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        Ok(self
            .stores
            .read()
            .await
            .get(name)
            .and_then(|store| store.get(request))
            .cloned())
    }

    async fn requests(&self, name: &str) -> Result<Vec<Request>> {
        let stores = self.stores.read().await;
        let store = stores
            .get(name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))?;
        Ok(store.keys().cloned().collect())
    }
}
