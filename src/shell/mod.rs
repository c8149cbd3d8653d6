//! Command parsing and process spawning.
//!
//! This module turns a validated command string into an isolated child
//! process and owns the per-command cancellation scope.

mod deadline;
mod executor;
mod parser;
mod process;

pub use deadline::DeadlineToken;
pub use executor::CommandExecutor;
pub use parser::{ParsedCommand, needs_shell, parse, shell};
pub use process::ProcessHandle;
