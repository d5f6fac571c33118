#[tokio::main]
async fn main() -> offline_cache::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = offline_cache::cli::run().await {
        log::error!("{e}");
        return Err(e);
    }
    Ok(())
}
