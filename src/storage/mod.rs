//! Cache storage abstraction: named stores of request/response pairs.

mod disk;
mod memory;

use async_trait::async_trait;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::error::{Error, Result};
use crate::request::{Request, Response};

/// A set of named cache stores.
///
/// Implementations serialize their own concurrent access.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens the named store, creating it if absent.
    async fn open(&self, name: &str) -> Result<()>;

    /// Returns the names of all existing stores, sorted.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Returns true if the named store exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Deletes the named store. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Stores a response under the request's identity, replacing any previous entry.
    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()>;

    /// Removes one entry from the named store. Returns whether it existed.
    async fn remove(&self, name: &str, request: &Request) -> Result<bool>;

    /// Looks up the exact `(method, url)` identity in the named store.
    ///
    /// A missing store is a miss, not an error.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>>;

    /// Returns the requests stored in the named store, sorted.
    async fn requests(&self, name: &str) -> Result<Vec<Request>>;
}

/// Checks that an entry may be stored.
fn check_cacheable(request: &Request, response: &Response) -> Result<()> {
    if !request.is_get() {
        return Err(Error::UnsupportedMethod(request.method.clone()));
    }
    if response.status == 206 {
        return Err(Error::PartialResponse(request.url.clone()));
    }
    Ok(())
}
