//! Error types shared across validation, download, execution and installation.
//!
//! Each concern has its own enum so callers can match on the exact failure;
//! [`InstallError`] wraps all of them and keeps cancellation distinguishable
//! from ordinary failures through [`InstallError::is_cancelled`].

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

/// A command was rejected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("command matches dangerous pattern '{rule}': {reason}")]
    DangerousPattern { rule: String, reason: String },

    #[error("command uses disallowed subcommand '{rule}': {reason}")]
    DisallowedSubcommand { rule: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("cannot parse an empty command")]
    Empty,
}

/// Fetching a remote install script failed before anything was executed.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download url '{0}'")]
    InvalidUrl(String),

    #[error("refusing non-HTTPS url '{0}'")]
    NonHttps(String),

    #[error("host '{0}' is not a trusted install-script origin")]
    UntrustedDomain(String),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("download exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("download timed out after {0:?}")]
    TimedOut(Duration),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("quarantine file error: {0}")]
    Quarantine(#[from] std::io::Error),

    #[error("quarantine path '{0}' escapes the temp directory")]
    PathEscape(String),
}

/// A downloaded script failed the content scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptContentError {
    #[error("script contains dangerous pattern '{0}'")]
    DangerousPattern(String),

    #[error("script is empty")]
    Empty,

    #[error("script is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {code:?}")]
    NonZeroExit { command: String, code: Option<i32> },

    #[error("'{command}' timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("i/o error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("repository data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Umbrella error for one application's install, or for the whole batch.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    ScriptContent(#[from] ScriptContentError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("registration failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("invalid application '{app}': {reason}")]
    InvalidApp { app: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("illegal phase transition: {0}")]
    Transition(String),

    #[error("unexpected fault: {0}")]
    Panicked(String),

    #[error("installation cancelled")]
    Cancelled,
}

impl InstallError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<regex::Error> for InstallError {
    fn from(err: regex::Error) -> Self {
        Self::Config(format!("invalid pattern: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(InstallError::Cancelled.is_cancelled());
        assert!(!InstallError::from(ValidationError::EmptyCommand).is_cancelled());
        assert!(
            !InstallError::from(ExecutionError::NonZeroExit {
                command: "false".into(),
                code: Some(1),
            })
            .is_cancelled()
        );
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err = InstallError::from(ValidationError::DangerousPattern {
            rule: "fork-bomb".into(),
            reason: "fork bomb".into(),
        });
        assert_eq!(
            err.to_string(),
            "command matches dangerous pattern 'fork-bomb': fork bomb"
        );
    }
}
