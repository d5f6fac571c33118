//! The offline asset cache controller and its lifecycle.
//!
//! An [`OfflineWorker`] pre-caches a fixed asset list on install, removes
//! stores left behind by previous versions on activate, and answers fetches
//! network-first with a fallback to its own store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::RwLock;

use crate::config::CacheConfig;
use crate::dispatch::{DispatcherBuilder, Event, EventHandler, EventKind, EventOutcome};
use crate::error::{Error, Result};
use crate::network::{HttpNetwork, Network};
use crate::request::{Request, Response};
use crate::stats::{FetchStats, FetchStatsTracker, InstallStats, InstallStatsBuilder};
use crate::storage::{CacheStorage, DiskStorage};

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Nothing has been installed yet.
    Uninstalled,
    /// Assets are being fetched into the store.
    Installing,
    /// Install finished; waiting to activate.
    Installed,
    /// Stale stores are being removed.
    Activating,
    /// Intercepting fetches.
    Activated,
    /// Install failed; the worker will never activate.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Trait for receiving install progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait InstallProgress: Send + Sync {
    /// Called when an asset fetch starts.
    fn on_asset_start(&self, _url: &str) {}

    /// Called when an asset has been written to the store.
    fn on_asset_cached(&self, _url: &str, _bytes: u64) {}

    /// Called when an asset fetch fails. The install will abort.
    fn on_asset_failed(&self, _url: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl InstallProgress for NoProgress {}

/// How a fetch was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The live network answered; the cache was not consulted.
    Network(Response),
    /// The network failed and the store had a matching entry.
    Cache(Response),
    /// The network failed and the store had nothing. No response is synthesized.
    Unavailable {
        /// The network error that triggered the fallback.
        error: String,
    },
}

impl FetchOutcome {
    /// The response, if there is one.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Network(r) | Self::Cache(r) => Some(r),
            Self::Unavailable { .. } => None,
        }
    }

    /// Consumes the outcome and returns the response, if there is one.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Network(r) | Self::Cache(r) => Some(r),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Offline asset cache controller.
pub struct OfflineWorker<S: CacheStorage = DiskStorage, N: Network = HttpNetwork> {
    config: CacheConfig,
    storage: S,
    network: N,
    state: RwLock<WorkerState>,
    progress: Arc<dyn InstallProgress>,
    fetch_stats: FetchStatsTracker,
}

impl<S: CacheStorage, N: Network> OfflineWorker<S, N> {
    /// Creates an uninstalled worker.
    #[must_use]
    pub fn new(config: CacheConfig, storage: S, network: N) -> Self {
        Self::with_state(config, storage, network, WorkerState::Uninstalled)
    }

    fn with_state(config: CacheConfig, storage: S, network: N, state: WorkerState) -> Self {
        Self {
            config,
            storage,
            network,
            state: RwLock::new(state),
            progress: Arc::new(NoProgress),
            fetch_stats: FetchStatsTracker::new(),
        }
    }

    /// Recreates a worker over existing storage.
    ///
    /// If the current store already exists the worker starts out installed
    /// and waiting to activate. Otherwise it starts uninstalled. A store is
    /// only created once every asset fetched, and a failed install removes
    /// a store it created, so an existing store means a completed install.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be queried.
    pub async fn restore(config: CacheConfig, storage: S, network: N) -> Result<Self> {
        let state = if storage.has(&config.cache_name).await? {
            log::debug!("Store {} exists, resuming as installed", config.cache_name);
            WorkerState::Installed
        } else {
            WorkerState::Uninstalled
        };
        Ok(Self::with_state(config, storage, network, state))
    }

    /// Sets the install progress receiver.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn InstallProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cache storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the network.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Returns fetch counters.
    #[must_use]
    pub fn fetch_stats(&self) -> FetchStats {
        self.fetch_stats.snapshot()
    }

    /// Moves from `expected` to `next`, or fails without changing state.
    async fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != expected {
            return Err(Error::InvalidState {
                expected,
                actual: *state,
            });
        }
        log::debug!("Worker {} -> {next}", *state);
        *state = next;
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Installs the worker: opens the current store and caches every asset.
    ///
    /// All assets are fetched concurrently and written only after every
    /// fetch succeeded. A failed fetch or a non-OK status aborts the install
    /// and leaves the worker redundant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the worker is uninstalled, or the
    /// first fetch or store error encountered.
    pub async fn install(&self) -> Result<InstallStats> {
        self.transition(WorkerState::Uninstalled, WorkerState::Installing)
            .await?;

        match self.precache().await {
            Ok(stats) => {
                self.set_state(WorkerState::Installed).await;
                log::info!(
                    "Installed {}: {} assets, {} bytes",
                    self.config.cache_name,
                    stats.assets_cached,
                    stats.total_bytes
                );
                Ok(stats)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                log::error!("Install of {} failed: {e}", self.config.cache_name);
                Err(e)
            }
        }
    }

    /// Fetches every asset, then opens the store and writes them.
    ///
    /// The store only appears once every fetch succeeded, so its presence
    /// marks a completed install. A failed write rolls back what this install
    /// wrote.
    async fn precache(&self) -> Result<InstallStats> {
        let name = &self.config.cache_name;
        let mut builder = InstallStatsBuilder::new();
        let urls = self.config.asset_urls()?;

        let fetched = try_join_all(urls.into_iter().map(|url| async move {
            let request = Request::get(url);
            self.progress.on_asset_start(&request.url);
            match self.fetch_asset(&request).await {
                Ok(response) => Ok((request, response)),
                Err(e) => {
                    self.progress.on_asset_failed(&request.url, &e.to_string());
                    Err(e)
                }
            }
        }))
        .await?;

        let existed = self.storage.has(name).await?;
        self.storage.open(name).await?;

        let mut written = Vec::with_capacity(fetched.len());
        for (request, response) in fetched {
            let bytes = response.body.len() as u64;
            if let Err(e) = self.storage.put(name, &request, response).await {
                self.progress.on_asset_failed(&request.url, &e.to_string());
                self.roll_back(existed, &written).await;
                return Err(e);
            }
            self.progress.on_asset_cached(&request.url, bytes);
            builder.add_asset(bytes);
            written.push(request);
        }

        Ok(builder.build())
    }

    /// Undoes a partially written install.
    ///
    /// A store this install created is deleted outright. In a store that
    /// already existed only the entries written by this install are removed.
    async fn roll_back(&self, existed: bool, written: &[Request]) {
        let name = &self.config.cache_name;
        let result = if existed {
            try_join_all(written.iter().map(|request| self.storage.remove(name, request)))
                .await
                .map(drop)
        } else {
            self.storage.delete(name).await.map(drop)
        };
        match result {
            Ok(()) => log::debug!("Rolled back {} entries in {name}", written.len()),
            Err(e) => log::warn!("Could not roll back install of {name}: {e}"),
        }
    }

    async fn fetch_asset(&self, request: &Request) -> Result<Response> {
        let response = self.network.fetch(request).await?;
        // Partial content cannot be stored, so it fails the fetch like any other bad status.
        if !response.is_ok() || response.status == 206 {
            return Err(Error::BadStatus {
                url: request.url.clone(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Activates the worker: deletes every store except the current one.
    ///
    /// The worker becomes activated even if a deletion fails; the failure is
    /// returned to the caller and not retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the worker is installed, or the
    /// first storage error encountered.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .await?;

        let result = self.delete_stale_stores().await;
        self.set_state(WorkerState::Activated).await;

        match &result {
            Ok(deleted) if deleted.is_empty() => {
                log::info!("Activated {}", self.config.cache_name);
            }
            Ok(deleted) => log::info!(
                "Activated {}, deleted stale stores: {}",
                self.config.cache_name,
                deleted.join(", ")
            ),
            Err(e) => log::error!("Activated {} with cleanup error: {e}", self.config.cache_name),
        }
        result
    }

    async fn delete_stale_stores(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|key| *key != self.config.cache_name)
            .collect();

        let deleted = try_join_all(stale.iter().map(|key| self.storage.delete(key))).await?;

        Ok(stale
            .into_iter()
            .zip(deleted)
            .filter_map(|(key, existed)| existed.then_some(key))
            .collect())
    }

    /// Answers a fetch: network first, then the current store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the worker is activated, or a
    /// storage error raised during the fallback lookup.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            return Err(Error::InvalidState {
                expected: WorkerState::Activated,
                actual: state,
            });
        }

        let error = match self.network.fetch(request).await {
            Ok(response) => {
                self.fetch_stats.record_network();
                return Ok(FetchOutcome::Network(response));
            }
            Err(e) => e,
        };

        log::warn!("Network failed for {request}: {error}, falling back to cache");
        match self
            .storage
            .match_request(&self.config.cache_name, request)
            .await?
        {
            Some(response) => {
                self.fetch_stats.record_cache_fallback();
                Ok(FetchOutcome::Cache(response))
            }
            None => {
                self.fetch_stats.record_unavailable();
                log::warn!("No cached entry for {request}");
                Ok(FetchOutcome::Unavailable {
                    error: error.to_string(),
                })
            }
        }
    }
}

impl<S, N> OfflineWorker<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// Registers this worker as the install, activate and fetch handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHandler`] if the builder already has a handler
    /// for one of the three kinds.
    pub fn register(self: Arc<Self>, builder: DispatcherBuilder) -> Result<DispatcherBuilder> {
        let handler: Arc<dyn EventHandler> = self;
        builder
            .register(EventKind::Install, Arc::clone(&handler))?
            .register(EventKind::Activate, Arc::clone(&handler))?
            .register(EventKind::Fetch, handler)
    }
}

#[async_trait]
impl<S: CacheStorage, N: Network> EventHandler for OfflineWorker<S, N> {
    async fn handle(&self, event: &Event) -> Result<EventOutcome> {
        match event {
            Event::Install => self.install().await.map(EventOutcome::Installed),
            Event::Activate => self.activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => self.handle_fetch(request).await.map(EventOutcome::Responded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ASSETS;
    use crate::storage::MemoryStorage;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    const ORIGIN: &str = "http://reports.test";

    /// A network that serves a fixed URL map and can be switched offline.
    struct MockNetwork {
        pages: Mutex<HashMap<String, Response>>,
        online: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockNetwork {
        fn new() -> Self {
            Self {
                pages: Mutex::new(HashMap::new()),
                online: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            }
        }

        fn serving(paths: &[&str]) -> Self {
            let network = Self::new();
            for path in paths {
                network.serve(path, Response::new(200, format!("content of {path}")));
            }
            network
        }

        fn serve(&self, path: &str, response: Response) {
            self.pages
                .lock()
                .unwrap()
                .insert(format!("{ORIGIN}{path}"), response);
        }

        fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Network for MockNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "offline",
                )));
            }
            Ok(self
                .pages
                .lock()
                .unwrap()
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Response::new(404, "not found")))
        }
    }

    /// Records progress callbacks.
    #[derive(Default)]
    struct RecordingProgress {
        started: Mutex<Vec<String>>,
        cached: Mutex<Vec<(String, u64)>>,
        failed: Mutex<Vec<String>>,
    }

    impl InstallProgress for RecordingProgress {
        fn on_asset_start(&self, url: &str) {
            self.started.lock().unwrap().push(url.to_string());
        }

        fn on_asset_cached(&self, url: &str, bytes: u64) {
            self.cached.lock().unwrap().push((url.to_string(), bytes));
        }

        fn on_asset_failed(&self, url: &str, _error: &str) {
            self.failed.lock().unwrap().push(url.to_string());
        }
    }

    /// Memory storage that can fail writes for one URL, or every delete.
    #[derive(Default)]
    struct FailingStorage {
        inner: MemoryStorage,
        fail_put: Option<String>,
        fail_delete: bool,
    }

    fn disk_full() -> Error {
        Error::Io(std::io::Error::other("disk full"))
    }

    #[async_trait]
    impl CacheStorage for FailingStorage {
        async fn open(&self, name: &str) -> Result<()> {
            self.inner.open(name).await
        }

        async fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys().await
        }

        async fn has(&self, name: &str) -> Result<bool> {
            self.inner.has(name).await
        }

        async fn delete(&self, name: &str) -> Result<bool> {
            if self.fail_delete {
                return Err(disk_full());
            }
            self.inner.delete(name).await
        }

        async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()> {
            if self.fail_put.as_deref() == Some(request.url.as_str()) {
                return Err(disk_full());
            }
            self.inner.put(name, request, response).await
        }

        async fn remove(&self, name: &str, request: &Request) -> Result<bool> {
            self.inner.remove(name, request).await
        }

        async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
            self.inner.match_request(name, request).await
        }

        async fn requests(&self, name: &str) -> Result<Vec<Request>> {
            self.inner.requests(name).await
        }
    }

    fn config() -> CacheConfig {
        CacheConfig::default().with_origin(ORIGIN)
    }

    fn offline_network() -> MockNetwork {
        let network = MockNetwork::serving(DEFAULT_ASSETS);
        network.set_online(false);
        network
    }

    fn worker(network: MockNetwork) -> OfflineWorker<MemoryStorage, MockNetwork> {
        OfflineWorker::new(config(), MemoryStorage::new(), network)
    }

    async fn active_worker() -> OfflineWorker<MemoryStorage, MockNetwork> {
        let worker = worker(MockNetwork::serving(DEFAULT_ASSETS));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        worker
    }

    fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    // ==================== Install ====================

    #[tokio::test]
    async fn install_caches_every_asset() {
        let worker = worker(MockNetwork::serving(DEFAULT_ASSETS));
        let stats = worker.install().await.unwrap();

        assert_eq!(stats.assets_cached, DEFAULT_ASSETS.len());
        assert_eq!(worker.state().await, WorkerState::Installed);
        for path in DEFAULT_ASSETS {
            let hit = worker
                .storage()
                .match_request("daily-report-v1", &Request::get(url(path)))
                .await
                .unwrap();
            assert!(hit.is_some(), "{path} missing from store");
        }
    }

    #[tokio::test]
    async fn install_reports_progress() {
        let progress = Arc::new(RecordingProgress::default());
        let worker = worker(MockNetwork::serving(DEFAULT_ASSETS))
            .with_progress(Arc::clone(&progress) as Arc<dyn InstallProgress>);
        let stats = worker.install().await.unwrap();

        assert_eq!(progress.started.lock().unwrap().len(), DEFAULT_ASSETS.len());
        let cached = progress.cached.lock().unwrap();
        assert_eq!(cached.len(), DEFAULT_ASSETS.len());
        assert_eq!(
            cached.iter().map(|(_, b)| b).sum::<u64>(),
            stats.total_bytes
        );
        assert!(progress.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_aborts_on_missing_asset() {
        // The last asset is not served and answers 404.
        let network = MockNetwork::serving(&DEFAULT_ASSETS[..DEFAULT_ASSETS.len() - 1]);
        let worker = worker(network);

        let result = worker.install().await;
        assert!(matches!(result, Err(Error::BadStatus { status: 404, .. })));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        // Nothing was written, even for the assets that did fetch.
        assert!(!worker.storage().has("daily-report-v1").await.unwrap());
    }

    #[tokio::test]
    async fn install_rejects_partial_content() {
        let network = MockNetwork::serving(DEFAULT_ASSETS);
        network.serve(
            "/static/vendor/bootstrap-icons.css",
            Response::new(206, ".bi{"),
        );
        let worker = worker(network);

        assert!(matches!(
            worker.install().await,
            Err(Error::BadStatus { status: 206, .. })
        ));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(!worker.storage().has("daily-report-v1").await.unwrap());
    }

    #[tokio::test]
    async fn write_failure_deletes_new_store() {
        let storage = FailingStorage {
            fail_put: Some(url("/static/vendor/bootstrap-icons.css")),
            ..FailingStorage::default()
        };
        let progress = Arc::new(RecordingProgress::default());
        let worker = OfflineWorker::new(config(), storage, MockNetwork::serving(DEFAULT_ASSETS))
            .with_progress(Arc::clone(&progress) as Arc<dyn InstallProgress>);

        assert!(matches!(worker.install().await, Err(Error::Io(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(!worker.storage().has("daily-report-v1").await.unwrap());
        assert_eq!(
            *progress.failed.lock().unwrap(),
            vec![url("/static/vendor/bootstrap-icons.css")]
        );
    }

    #[tokio::test]
    async fn write_failure_keeps_existing_entries() {
        let storage = FailingStorage {
            fail_put: Some(url("/static/vendor/bootstrap-icons.css")),
            ..FailingStorage::default()
        };
        let report = Request::get(url("/reports/1"));
        storage.inner.open("daily-report-v1").await.unwrap();
        storage
            .inner
            .put("daily-report-v1", &report, Response::new(200, "report"))
            .await
            .unwrap();
        let worker = OfflineWorker::new(config(), storage, MockNetwork::serving(DEFAULT_ASSETS));

        assert!(worker.install().await.is_err());
        assert_eq!(
            worker.storage().requests("daily-report-v1").await.unwrap(),
            vec![report]
        );
    }

    #[tokio::test]
    async fn failed_install_on_disk_keeps_previous_version() {
        let dir = TempDir::new().unwrap();
        let v2 = config().with_cache_name("daily-report-v2");

        let previous = OfflineWorker::new(
            config(),
            DiskStorage::new(dir.path()),
            MockNetwork::serving(DEFAULT_ASSETS),
        );
        previous.install().await.unwrap();
        previous.activate().await.unwrap();

        let upgrade = OfflineWorker::new(v2.clone(), DiskStorage::new(dir.path()), offline_network());
        assert!(upgrade.install().await.is_err());
        assert_eq!(upgrade.state().await, WorkerState::Redundant);

        // A later process must not take the failed install for a finished one.
        let resumed = OfflineWorker::restore(v2, DiskStorage::new(dir.path()), offline_network())
            .await
            .unwrap();
        assert_eq!(resumed.state().await, WorkerState::Uninstalled);
        assert!(matches!(
            resumed.activate().await,
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(
            DiskStorage::new(dir.path()).keys().await.unwrap(),
            vec!["daily-report-v1"]
        );

        let current = OfflineWorker::restore(config(), DiskStorage::new(dir.path()), offline_network())
            .await
            .unwrap();
        current.activate().await.unwrap();
        let outcome = current
            .handle_fetch(&Request::get(url("/static/style.css")))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Cache(_)));
    }

    #[tokio::test]
    async fn install_aborts_when_offline() {
        let network = MockNetwork::serving(DEFAULT_ASSETS);
        network.set_online(false);
        let progress = Arc::new(RecordingProgress::default());
        let worker = worker(network).with_progress(Arc::clone(&progress) as Arc<dyn InstallProgress>);

        assert!(matches!(worker.install().await, Err(Error::Io(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(!progress.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_twice_is_invalid() {
        let worker = worker(MockNetwork::serving(DEFAULT_ASSETS));
        worker.install().await.unwrap();
        assert!(matches!(
            worker.install().await,
            Err(Error::InvalidState {
                expected: WorkerState::Uninstalled,
                actual: WorkerState::Installed,
            })
        ));
    }

    #[tokio::test]
    async fn redundant_worker_cannot_activate() {
        let network = MockNetwork::new();
        network.set_online(false);
        let worker = worker(network);
        let _ = worker.install().await;

        assert!(matches!(
            worker.activate().await,
            Err(Error::InvalidState {
                actual: WorkerState::Redundant,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn empty_asset_list_installs_empty_store() {
        let worker = OfflineWorker::new(
            config().with_assets(Vec::<String>::new()),
            MemoryStorage::new(),
            MockNetwork::new(),
        );
        let stats = worker.install().await.unwrap();
        assert_eq!(stats.assets_cached, 0);
        assert!(worker.storage().has("daily-report-v1").await.unwrap());
    }

    // ==================== Activate ====================

    #[tokio::test]
    async fn activate_deletes_stale_stores() {
        let storage = MemoryStorage::new();
        storage.open("daily-report-v0").await.unwrap();
        storage.open("something-else").await.unwrap();
        let worker = OfflineWorker::new(config(), storage, MockNetwork::serving(DEFAULT_ASSETS));

        worker.install().await.unwrap();
        let deleted = worker.activate().await.unwrap();

        assert_eq!(deleted, vec!["daily-report-v0", "something-else"]);
        assert_eq!(
            worker.storage().keys().await.unwrap(),
            vec!["daily-report-v1"]
        );
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn activate_with_failed_delete_still_activates() {
        let storage = FailingStorage {
            fail_delete: true,
            ..FailingStorage::default()
        };
        storage.inner.open("daily-report-v0").await.unwrap();
        let worker = OfflineWorker::new(config(), storage, MockNetwork::serving(DEFAULT_ASSETS));
        worker.install().await.unwrap();

        assert!(matches!(worker.activate().await, Err(Error::Io(_))));
        assert_eq!(worker.state().await, WorkerState::Activated);
        // The stale store is left behind, and fetches are served.
        assert!(worker.storage().has("daily-report-v0").await.unwrap());
        let outcome = worker.handle_fetch(&Request::get(url("/"))).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Network(_)));
    }

    #[tokio::test]
    async fn activate_before_install_is_invalid() {
        let worker = worker(MockNetwork::new());
        assert!(matches!(
            worker.activate().await,
            Err(Error::InvalidState {
                expected: WorkerState::Installed,
                actual: WorkerState::Uninstalled,
            })
        ));
    }

    // ==================== Fetch ====================

    #[tokio::test]
    async fn online_fetch_returns_network_response() {
        let worker = active_worker().await;
        worker
            .network()
            .serve("/static/style.css", Response::new(200, "fresh css"));

        let outcome = worker
            .handle_fetch(&Request::get(url("/static/style.css")))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Network(Response::new(200, "fresh css")));
    }

    #[tokio::test]
    async fn online_error_status_is_not_a_fallback() {
        let worker = active_worker().await;
        worker
            .network()
            .serve("/", Response::new(500, "server error"));

        let outcome = worker.handle_fetch(&Request::get(url("/"))).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Network(Response::new(500, "server error")));
    }

    #[tokio::test]
    async fn offline_fetch_falls_back_to_cache() {
        let worker = active_worker().await;
        worker.network().set_online(false);

        let outcome = worker
            .handle_fetch(&Request::get(url("/static/vendor/bootstrap.min.css")))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Cache(Response::new(
                200,
                "content of /static/vendor/bootstrap.min.css"
            ))
        );
        assert_eq!(worker.fetch_stats().cache_fallback, 1);
    }

    #[tokio::test]
    async fn offline_fetch_of_uncached_url_is_unavailable() {
        let worker = active_worker().await;
        worker.network().set_online(false);

        let outcome = worker
            .handle_fetch(&Request::get(url("/reports/42")))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Unavailable { .. }));
        assert!(outcome.response().is_none());
        assert_eq!(worker.fetch_stats().unavailable, 1);
    }

    #[tokio::test]
    async fn offline_non_get_is_unavailable() {
        let worker = active_worker().await;
        worker.network().set_online(false);

        let outcome = worker
            .handle_fetch(&Request::new("POST", url("/")))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Unavailable { .. }));
    }

    #[tokio::test]
    async fn fetch_before_activation_is_invalid() {
        let worker = worker(MockNetwork::serving(DEFAULT_ASSETS));
        worker.install().await.unwrap();
        let calls = worker.network().calls();

        assert!(matches!(
            worker.handle_fetch(&Request::get(url("/"))).await,
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(worker.network().calls(), calls);
    }

    #[tokio::test]
    async fn fetch_stats_track_outcomes() {
        let worker = active_worker().await;
        worker.handle_fetch(&Request::get(url("/"))).await.unwrap();
        worker.network().set_online(false);
        worker.handle_fetch(&Request::get(url("/"))).await.unwrap();
        worker.handle_fetch(&Request::get(url("/nope"))).await.unwrap();

        assert_eq!(
            worker.fetch_stats(),
            FetchStats {
                network: 1,
                cache_fallback: 1,
                unavailable: 1,
            }
        );
    }

    // ==================== Restore ====================

    #[tokio::test]
    async fn restore_with_existing_store_is_installed() {
        let storage = MemoryStorage::new();
        storage.open("daily-report-v0").await.unwrap();
        storage.open("daily-report-v1").await.unwrap();
        let worker = OfflineWorker::restore(config(), storage, MockNetwork::new())
            .await
            .unwrap();
        assert_eq!(worker.state().await, WorkerState::Installed);

        assert_eq!(worker.activate().await.unwrap(), vec!["daily-report-v0"]);
    }

    #[tokio::test]
    async fn restore_without_store_is_uninstalled() {
        let storage = MemoryStorage::new();
        storage.open("daily-report-v0").await.unwrap();
        let worker = OfflineWorker::restore(config(), storage, MockNetwork::new())
            .await
            .unwrap();
        assert_eq!(worker.state().await, WorkerState::Uninstalled);
    }

    // ==================== Properties ====================

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_listed_asset_is_cached(names in prop::collection::vec("[a-z]{1,8}", 0..8)) {
                let paths: Vec<String> = names.iter().map(|n| format!("/static/{n}.css")).collect();
                let network = MockNetwork::new();
                for path in &paths {
                    network.serve(path, Response::new(200, path.clone()));
                }
                let worker = OfflineWorker::new(
                    config().with_assets(paths.clone()),
                    MemoryStorage::new(),
                    network,
                );

                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    worker.install().await.unwrap();
                    let stored = worker.storage().requests("daily-report-v1").await.unwrap();
                    for path in &paths {
                        prop_assert!(stored.contains(&Request::get(url(path))));
                    }
                    Ok(())
                })?;
            }
        }
    }
}
