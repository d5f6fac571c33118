//! Error types for the offline-cache library.

use thiserror::Error;

use crate::worker::WorkerState;

/// Errors that can occur during cache and lifecycle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error (the network rejected the request).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during store operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be encoded or decoded.
    #[error("Entry encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// An asset answered with a non-OK status during install.
    #[error("Bad response status {status} for {url}")]
    BadStatus {
        /// URL of the asset.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },

    /// A lifecycle operation was attempted in the wrong state.
    #[error("Invalid worker state: expected {expected}, got {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: WorkerState,
        /// State the worker was in.
        actual: WorkerState,
    },

    /// A path or origin could not be turned into an absolute URL.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Cache name cannot be used as a store identifier.
    #[error("Invalid cache name: {0:?}")]
    InvalidCacheName(String),

    /// Only `GET` requests can be stored.
    #[error("Cannot cache {0} requests")]
    UnsupportedMethod(String),

    /// Partial (206) responses cannot be stored.
    #[error("Cannot cache partial response for {0}")]
    PartialResponse(String),

    /// The named store has not been opened.
    #[error("Cache store not found: {0}")]
    StoreNotFound(String),

    /// No handler is registered for an event kind.
    #[error("No handler registered for {0} events")]
    NoHandler(crate::dispatch::EventKind),

    /// A handler is already registered for an event kind.
    #[error("Handler already registered for {0} events")]
    DuplicateHandler(crate::dispatch::EventKind),

    /// The process-wide dispatcher was already installed.
    #[error("Global dispatcher already installed")]
    DispatcherInstalled,
}

/// A specialized `Result` type for offline-cache operations.
pub type Result<T> = std::result::Result<T, Error>;
