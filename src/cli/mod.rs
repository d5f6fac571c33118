//! CLI mode for offline-cache: drives the worker lifecycle from the command line.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::{
    AppConfig, CacheStorage, Dispatcher, DiskStorage, Event, EventOutcome, HttpNetwork,
    OfflineWorker, Request, Result, WorkerState,
};

use progress::{BarProgress, describe_fetch, print_install_summary};

/// Pre-cache static assets and serve them network-first with an offline fallback.
#[derive(Parser, Debug)]
#[command(name = "offline-cache", version)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true, env = "OFFLINE_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Origin asset paths are resolved against.
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Directory holding the cache stores.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Name (version) of the current cache store.
    #[arg(long, global = true)]
    pub cache_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch every asset into the current store.
    Install,
    /// Delete every store other than the current one.
    Activate,
    /// Install, then activate.
    Run,
    /// Fetch paths network-first, falling back to the current store.
    Fetch {
        /// Paths or absolute URLs to fetch.
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List stores and their entries.
    List,
}

/// Applies command-line overrides on top of the loaded configuration.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(ref origin) = cli.origin {
        config.cache.origin.clone_from(origin);
    }
    if let Some(ref name) = cli.cache_name {
        config.cache.cache_name.clone_from(name);
    }
    if let Some(ref store) = cli.store {
        config.paths.store_dir.clone_from(store);
    }
    Ok(config)
}

/// Builds the worker for a command.
///
/// Installing always starts from a fresh worker; every other command resumes
/// from whatever is already in the store.
async fn build_worker(
    command: &Command,
    config: &AppConfig,
    progress: Option<Arc<BarProgress>>,
) -> Result<OfflineWorker> {
    let storage = DiskStorage::new(&config.paths.store_dir);
    let network = HttpNetwork::new(&config.cache)?;
    let worker = match command {
        Command::Install | Command::Run => {
            OfflineWorker::new(config.cache.clone(), storage, network)
        }
        Command::Activate | Command::Fetch { .. } | Command::List => {
            OfflineWorker::restore(config.cache.clone(), storage, network).await?
        }
    };
    Ok(match progress {
        Some(progress) => worker.with_progress(progress),
        None => worker,
    })
}

/// Runs the CLI with arguments from the process environment.
///
/// # Errors
///
/// Returns an error if configuration loading, the worker lifecycle, or
/// storage access fails.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    log::debug!("Store directory: {}", config.paths.store_dir.display());

    let progress = matches!(cli.command, Command::Install | Command::Run)
        .then(|| Arc::new(BarProgress::new(config.cache.assets.len())));
    let worker = Arc::new(build_worker(&cli.command, &config, progress.clone()).await?);

    let dispatcher = Arc::clone(&worker)
        .register(Dispatcher::builder())?
        .build()
        .install_global()?;

    let result = execute(&cli.command, &worker, dispatcher).await;
    if let Some(progress) = progress {
        progress.finish();
    }
    result
}

/// Executes one command against a registered worker.
///
/// # Errors
///
/// Returns the first lifecycle or storage error.
pub async fn execute(
    command: &Command,
    worker: &OfflineWorker,
    dispatcher: &Dispatcher,
) -> Result<()> {
    let name = worker.config().cache_name.clone();
    match command {
        Command::Install => install(dispatcher, &name).await,
        Command::Activate => activate(dispatcher, &name).await,
        Command::Run => {
            install(dispatcher, &name).await?;
            activate(dispatcher, &name).await
        }
        Command::Fetch { paths } => {
            if worker.state().await == WorkerState::Installed {
                activate(dispatcher, &name).await?;
            }
            for path in paths {
                let url = worker.config().resolve(path)?;
                let outcome = dispatcher.dispatch(Event::Fetch(Request::get(url.clone()))).await?;
                if let EventOutcome::Responded(outcome) = outcome {
                    println!("{}", describe_fetch(&url, &outcome));
                }
            }
            let stats = worker.fetch_stats();
            log::info!(
                "{} fetched: {} network, {} cache, {} unavailable",
                stats.total(),
                stats.network,
                stats.cache_fallback,
                stats.unavailable
            );
            Ok(())
        }
        Command::List => list(worker.storage(), &name).await,
    }
}

async fn install(dispatcher: &Dispatcher, name: &str) -> Result<()> {
    if let EventOutcome::Installed(stats) = dispatcher.dispatch(Event::Install).await? {
        print_install_summary(name, &stats);
    }
    Ok(())
}

async fn activate(dispatcher: &Dispatcher, name: &str) -> Result<()> {
    if let EventOutcome::Activated(deleted) = dispatcher.dispatch(Event::Activate).await? {
        println!("Activated {name}");
        for store in deleted {
            println!("  deleted {store}");
        }
    }
    Ok(())
}

async fn list(storage: &DiskStorage, current: &str) -> Result<()> {
    let keys = storage.keys().await?;
    if keys.is_empty() {
        println!("No cache stores in {}", storage.root().display());
        return Ok(());
    }
    for key in keys {
        let marker = if key == current { "*" } else { " " };
        let requests = storage.requests(&key).await?;
        println!("{marker} {key} ({} entries)", requests.len());
        for request in requests {
            println!("    {request}");
        }
    }
    Ok(())
}
