//! Progress bar and summary output for the CLI.

use indicatif::{ProgressBar, ProgressStyle};

use crate::{FetchOutcome, InstallProgress, InstallStats};

/// Formats a byte count as a human-readable string (B, KB, MB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Reports install progress as one bar counting cached assets.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Creates a bar for `assets` assets.
    #[must_use]
    pub fn new(assets: usize) -> Self {
        let bar = ProgressBar::new(assets as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} assets - {msg}",
        )
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("━━╌"));
        bar.set_style(style);
        Self { bar }
    }

    /// Removes the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl InstallProgress for BarProgress {
    fn on_asset_start(&self, url: &str) {
        self.bar.set_message(url.to_string());
    }

    fn on_asset_cached(&self, url: &str, bytes: u64) {
        self.bar.inc(1);
        self.bar
            .println(format!("  cached {url} ({})", format_bytes(bytes)));
    }

    fn on_asset_failed(&self, url: &str, error: &str) {
        self.bar.println(format!("  failed {url}: {error}"));
        self.bar.abandon();
    }
}

/// Prints the result of an install.
pub fn print_install_summary(cache_name: &str, stats: &InstallStats) {
    println!(
        "Installed {cache_name}: {} assets, {} in {:.1}s",
        stats.assets_cached,
        format_bytes(stats.total_bytes),
        stats.elapsed.as_secs_f64()
    );
}

/// One line describing how a fetch was answered.
#[must_use]
pub fn describe_fetch(url: &str, outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Network(r) => format!(
            "network {} {} {url}",
            r.status,
            format_bytes(r.body.len() as u64)
        ),
        FetchOutcome::Cache(r) => format!(
            "cache   {} {} {url}",
            r.status,
            format_bytes(r.body.len() as u64)
        ),
        FetchOutcome::Unavailable { error } => format!("offline --- {url} ({error})"),
    }
}
