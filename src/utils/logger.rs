//! Log file setup.
//!
//! Everything the library logs through `tracing` goes to a per-run file in
//! `logs/` so it never interleaves with the streamed child output on the
//! console. The level comes from `RUST_LOG` (default `info`):
//! - `RUST_LOG=debug` also records every child output line
//! - `RUST_LOG=warn` keeps only rejections and failures

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log directory: `logs/` next to the executable.
pub fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// File name for a run started now, e.g. `rusty-installer.2024-12-06-14-30-25.log`.
pub fn log_file_name() -> String {
    format!("rusty-installer.{}.log", Local::now().format("%Y-%m-%d-%H-%M-%S"))
}

/// Initialize file logging under `log_dir`.
///
/// Returns the writer guard (keep it alive until exit so buffered lines are
/// flushed) and the log path. Logging problems are reported on stderr and
/// never stop the installer.
pub fn init_logging(log_dir: &Path) -> Option<(WorkerGuard, PathBuf)> {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        return None;
    }

    let log_path = log_dir.join(log_file_name());
    let log_file = match fs::File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {}", e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: Logging already initialized: {}", e);
        return None;
    }

    tracing::info!("Logging initialized - writing to {}", log_path.display());
    Some((guard, log_path))
}
