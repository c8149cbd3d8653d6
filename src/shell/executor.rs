//! Command execution gating.
//!
//! This module provides the single spawn entrypoint: every command is
//! validated before it is parsed, and nothing is spawned for a command the
//! validator rejects.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ProcessHandle;
use super::parser::{ParsedCommand, parse, shell};
use crate::error::ParseError;
use crate::error::{ExecutionError, InstallError, ValidationError};
use crate::security::{CommandValidator, PatternSet, SecurityLevel};

/// Validating spawner.
#[derive(Debug, Clone)]
pub enum CommandExecutor {
    /// Fixed moderate policy.
    Default(CommandValidator),
    /// Policy chosen at construction; used by the installer.
    Secure(CommandValidator),
}

impl CommandExecutor {
    pub fn moderate(patterns: Arc<PatternSet>) -> Self {
        Self::Default(CommandValidator::new(SecurityLevel::Moderate, patterns))
    }

    pub fn secure(level: SecurityLevel, patterns: Arc<PatternSet>) -> Self {
        Self::Secure(CommandValidator::new(level, patterns))
    }

    pub fn validator(&self) -> &CommandValidator {
        match self {
            Self::Default(validator) | Self::Secure(validator) => validator,
        }
    }

    pub fn level(&self) -> SecurityLevel {
        self.validator().level()
    }

    pub fn validate(&self, command: &str) -> Result<(), ValidationError> {
        let outcome = self.validator().validate(command);
        if !outcome.accepted {
            warn!(
                "rejected command under {} policy (rule {:?}): {}",
                self.level(),
                outcome.rule,
                command
            );
        }
        outcome.into_result()
    }

    /// Validate, parse and spawn `command`.
    pub fn execute(
        &self,
        token: &CancellationToken,
        command: &str,
    ) -> Result<ProcessHandle, InstallError> {
        self.spawn(token, command, parse)
    }

    /// Like [`execute`](Self::execute) but always runs through `bash -c`.
    pub fn execute_shell(
        &self,
        token: &CancellationToken,
        snippet: &str,
    ) -> Result<ProcessHandle, InstallError> {
        self.spawn(token, snippet, shell)
    }

    fn spawn(
        &self,
        token: &CancellationToken,
        command: &str,
        parser: fn(&str) -> Result<ParsedCommand, ParseError>,
    ) -> Result<ProcessHandle, InstallError> {
        if token.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        self.validate(command)?;
        let parsed = parser(command)?;
        debug!(
            "spawning {} (shell: {})",
            parsed.display(),
            parsed.needs_shell
        );

        let child = build_command(&parsed)
            .spawn()
            .map_err(|source| ExecutionError::SpawnFailed {
                command: command.to_string(),
                source,
            })?;
        Ok(ProcessHandle::new(command, child))
    }
}

fn build_command(parsed: &ParsedCommand) -> Command {
    let mut cmd = Command::new(&parsed.executable);
    cmd.args(&parsed.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate(&mut cmd);
    cmd
}

#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(windows)]
fn isolate(cmd: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn isolate(_cmd: &mut Command) {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::shell::DeadlineToken;

    fn patterns() -> Arc<PatternSet> {
        Arc::new(PatternSet::builtin().unwrap())
    }

    #[test]
    fn test_default_variant_is_moderate() {
        let executor = CommandExecutor::moderate(patterns());
        assert_eq!(executor.level(), SecurityLevel::Moderate);
        assert!(matches!(executor, CommandExecutor::Default(_)));
    }

    #[tokio::test]
    async fn test_rejected_command_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let executor = CommandExecutor::secure(SecurityLevel::Strict, patterns());
        let command = format!("touch {} && echo $(whoami)", marker.display());

        let err = executor
            .execute(&CancellationToken::new(), &command)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            InstallError::Validation(ValidationError::DisallowedSubcommand { .. })
        ));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_cancelled_token_spawns_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let executor = CommandExecutor::moderate(patterns());
        assert!(executor.execute(&token, "true").err().unwrap().is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_wait() {
        let root = CancellationToken::new();
        let executor = CommandExecutor::secure(SecurityLevel::Moderate, patterns());
        let mut handle = executor.execute(&root, "true").unwrap();
        let scope = DeadlineToken::new(&root, Duration::from_secs(10));
        let status = handle.wait(&scope).await.unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_shell_still_validates() {
        let executor = CommandExecutor::moderate(patterns());
        let err = executor
            .execute_shell(&CancellationToken::new(), "mkfs.ext4 /dev/sdb1")
            .err()
            .unwrap();
        assert!(matches!(err, InstallError::Validation(_)));

        let root = CancellationToken::new();
        let mut handle = executor.execute_shell(&root, "test -n \"$HOME\"").unwrap();
        let scope = DeadlineToken::new(&root, Duration::from_secs(10));
        assert!(handle.wait(&scope).await.unwrap().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_times_out() {
        let root = CancellationToken::new();
        let executor = CommandExecutor::secure(SecurityLevel::Moderate, patterns());
        let mut handle = executor.execute(&root, "sleep 30").unwrap();
        let scope = DeadlineToken::new(&root, Duration::from_millis(100));
        let err = handle.wait(&scope).await.err().unwrap();
        assert!(matches!(
            err,
            InstallError::Execution(ExecutionError::TimedOut { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_observes_cancellation() {
        let root = CancellationToken::new();
        let executor = CommandExecutor::secure(SecurityLevel::Moderate, patterns());
        let mut handle = executor.execute(&root, "sleep 30").unwrap();
        let scope = DeadlineToken::new(&root, Duration::from_secs(60));
        root.cancel();
        let err = handle.wait(&scope).await.err().unwrap();
        assert!(err.is_cancelled());
    }
}
