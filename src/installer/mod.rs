//! Install orchestration.
//!
//! [`StreamingInstaller`] walks each [`AppConfig`] through its phases,
//! running every command through the validating executor and streaming the
//! output (with password prompts) to the event sink.

mod model;
mod phase;
mod plan;
mod prompt;
mod pump;
mod streaming;
mod theme;

pub use model::{AppConfig, InstallMethod, SourceDescriptor, Step, Theme};
pub use phase::{Phase, RunningInstall};
pub use plan::{PlannedCommand, check_app, plan_install, plan_sources, plan_steps};
pub use prompt::{looks_like_password_prompt, sanitize_reply};
pub use streaming::{BatchReport, StreamingInstaller};
pub use theme::{select_theme, theme_key};
