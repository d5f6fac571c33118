//! offline-cache - network-first asset caching with an offline fallback.
//!
//! A worker pre-caches a fixed list of static assets into a versioned store
//! when installed, deletes stores of older versions when activated, and
//! answers fetches from the live network, falling back to the store when the
//! network fails.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use offline_cache::{
//!     CacheConfig, Dispatcher, DiskStorage, Event, HttpNetwork, OfflineWorker, Request,
//! };
//!
//! # async fn example() -> offline_cache::Result<()> {
//! let config = CacheConfig::default().with_origin("http://127.0.0.1:5000");
//! let network = HttpNetwork::new(&config)?;
//! let worker = Arc::new(OfflineWorker::new(config, DiskStorage::new("caches"), network));
//!
//! let dispatcher = worker.register(Dispatcher::builder())?.build();
//! dispatcher.dispatch(Event::Install).await?;
//! dispatcher.dispatch(Event::Activate).await?;
//!
//! let outcome = dispatcher
//!     .dispatch(Event::Fetch(Request::get("http://127.0.0.1:5000/static/style.css")))
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod request;
pub mod stats;
pub mod storage;
pub mod worker;

// Re-export main types for convenience
pub use config::{AppConfig, CacheConfig, PathConfig};
pub use dispatch::{Dispatcher, DispatcherBuilder, Event, EventHandler, EventKind, EventOutcome};
pub use error::{Error, Result};
pub use network::{HttpNetwork, Network};
pub use request::{Request, Response};
pub use stats::{FetchStats, InstallStats};
pub use storage::{CacheStorage, DiskStorage, MemoryStorage};
pub use worker::{FetchOutcome, InstallProgress, NoProgress, OfflineWorker, WorkerState};
