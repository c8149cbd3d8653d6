//! rusty-installer - a developer-machine installer that runs semi-trusted
//! install commands safely.
//!
//! This library provides:
//! - Pattern-based command validation at three security levels
//! - A validating executor that spawns isolated, cancellable processes
//! - A download-validate-execute guard for remote install scripts
//! - A streaming installer with password-prompt mediation
//!
//! # Example
//!
//! ```no_run
//! use rusty_installer::config::InstallerConfig;
//! use rusty_installer::event::{InstallEvent, init_event_channel};
//! use rusty_installer::installer::{AppConfig, InstallMethod, StreamingInstaller};
//! use rusty_installer::repository::{MemoryRepository, shared};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (sink, mut events) = init_event_channel();
//!     let installer = StreamingInstaller::new(
//!         InstallerConfig::default(),
//!         shared(MemoryRepository::new()),
//!         sink,
//!     )?;
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             if let InstallEvent::InputRequest(request) = event {
//!                 request.respond("hunter2".to_string());
//!             }
//!         }
//!     });
//!
//!     let git = AppConfig::new("git", InstallMethod::Apt { packages: vec!["git".into()] });
//!     let report = installer.run_batch(&[git]).await?;
//!     println!("installed: {:?}", report.completed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod event;
pub mod installer;
pub mod repository;
pub mod security;
pub mod shell;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use config::{AppList, InstallerConfig};
pub use error::{InstallError, Result};
pub use event::{EventSink, InstallEvent, LogEvent, init_event_channel};
pub use installer::{AppConfig, BatchReport, InstallMethod, StreamingInstaller};
pub use security::{CommandValidator, SecretBuffer, SecurityLevel};
pub use shell::CommandExecutor;
