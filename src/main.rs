//! Main entry point for rusty-installer.
//!
//! Loads the app list and configuration, wires the installer to the console
//! front end, and maps the batch outcome to an exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};

use rusty_installer::config::{AppList, InstallerConfig, default_state_path};
use rusty_installer::event::init_event_channel;
use rusty_installer::installer::StreamingInstaller;
use rusty_installer::repository::{JsonFileRepository, shared};
use rusty_installer::security::SecurityLevel;
use rusty_installer::ui::console::{ConsoleOptions, run_console};
use rusty_installer::utils::logger;

/// Exit code for a batch stopped by the user.
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "rusty-installer", version, about = "Install developer tools from a vetted app list")]
struct Cli {
    /// JSON file listing the apps to install
    apps: PathBuf,

    /// Installer configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured security level: strict, moderate or permissive
    #[arg(long)]
    level: Option<SecurityLevel>,

    /// Installed-apps state file [default: ~/.rusty-installer/state.json]
    #[arg(long)]
    state: Option<PathBuf>,

    /// Directory for log files [default: logs/ next to the executable]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Show phase changes and other debug events
    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let log_dir = cli.log_dir.clone().unwrap_or_else(logger::default_log_dir);
    let _log_guard = logger::init_logging(&log_dir);

    let mut config = match &cli.config {
        Some(path) => InstallerConfig::load(path)?,
        None => InstallerConfig::default(),
    };
    if let Some(level) = cli.level {
        config.security_level = level;
    }

    let apps = AppList::load(&cli.apps)?;
    let state_path = cli.state.clone().unwrap_or_else(default_state_path);
    let repository = JsonFileRepository::open(&state_path)
        .with_context(|| format!("Failed to open state file {}", state_path.display()))?;
    info!(
        "installing {} apps from {} at {} level",
        apps.apps.len(),
        cli.apps.display(),
        config.security_level
    );

    let (sink, events) = init_event_channel();
    let installer = StreamingInstaller::new(config, shared(repository), sink)
        .context("Failed to set up the installer")?;
    let token = installer.cancellation_token();

    let options = ConsoleOptions {
        verbose: cli.verbose,
        color: !cli.no_color,
    };
    let console = tokio::spawn(run_console(events, token.clone(), options));
    let ctrl_c = tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ncancelling, waiting for the running command to stop...");
                token.cancel();
            }
        }
    });

    let result = installer.run_batch(&apps.apps).await;
    // closes the event channel so the console drains and exits
    drop(installer);
    ctrl_c.abort();
    if let Err(e) = console.await {
        warn!("console task failed: {}", e);
    }

    match result {
        Ok(report) => {
            println!();
            println!("{} installed, {} failed", report.completed.len(), report.failed.len());
            for (app, reason) in &report.failed {
                println!("  {}: {}", app, reason);
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("installation cancelled");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e) => Err(e.into()),
    }
}
