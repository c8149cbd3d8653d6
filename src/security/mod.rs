//! Security module for command validation and secret handling.
//!
//! This module classifies raw command strings under a configurable
//! [`SecurityLevel`] and provides the [`SecretBuffer`] used while relaying
//! passwords to child processes.

mod level;
mod patterns;
mod secret;
mod validator;

pub use level::SecurityLevel;
pub use patterns::{PatternRule, PatternSet};
pub use secret::SecretBuffer;
pub use validator::{CommandValidator, RejectReason, ValidationOutcome};
