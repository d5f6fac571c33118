//! On-disk cache storage: one directory per store, one JSON file per entry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CacheStorage, check_cacheable};
use crate::error::{Error, Result};
use crate::request::{Request, Response};

/// Serialized form of a cached request/response pair.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    /// Base64-encoded body.
    body: String,
    cached_at: DateTime<Utc>,
}

impl StoredEntry {
    fn new(request: &Request, response: &Response) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body: BASE64.encode(&response.body),
            cached_at: Utc::now(),
        }
    }

    fn request(&self) -> Request {
        Request::new(&self.method, self.url.clone())
    }

    fn into_response(self) -> Result<Response> {
        let body = BASE64
            .decode(self.body.as_bytes())
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        Ok(Response {
            status: self.status,
            headers: self.headers,
            body: body.into(),
        })
    }
}

/// File name of an entry: SHA-256 of `"METHOD url"`.
fn entry_file_name(request: &Request) -> String {
    format!("{:x}.json", Sha256::digest(request.key().as_bytes()))
}

/// Store names become directory names.
fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(Error::InvalidCacheName(name.to_string()));
    }
    Ok(())
}

/// Cache storage persisted under a root directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    async fn read_entry(path: &Path) -> Result<Option<StoredEntry>> {
        match tokio::fs::read(path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<()> {
        let dir = self.store_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let dir = self.store_dir(name)?;
        match tokio::fs::metadata(&dir).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.store_dir(name)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()> {
        check_cacheable(request, &response)?;
        let dir = self.store_dir(name)?;
        if !self.has(name).await? {
            return Err(Error::StoreNotFound(name.to_string()));
        }

        let entry = StoredEntry::new(request, &response);
        let json = serde_json::to_vec(&entry)?;

        // Write a temp file and rename so readers never see a torn entry.
        let path = dir.join(entry_file_name(request));
        let tmp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, name: &str, request: &Request) -> Result<bool> {
        let path = self.store_dir(name)?.join(entry_file_name(request));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        let path = self.store_dir(name)?.join(entry_file_name(request));
        match Self::read_entry(&path).await? {
            Some(entry) if entry.request() == *request => entry.into_response().map(Some),
            _ => Ok(None),
        }
    }

    async fn requests(&self, name: &str) -> Result<Vec<Request>> {
        let dir = self.store_dir(name)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::StoreNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut requests = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some(stored)) => requests.push(stored.request()),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping unreadable entry {}: {e}", path.display()),
            }
        }
        requests.sort();
        Ok(requests)
    }
}
