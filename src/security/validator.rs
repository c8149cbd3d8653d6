//! Command validation against a fixed security level.
//!
//! Validation is pattern based and never touches the network or filesystem.
//!
//! # Rules
//! - Empty: always rejected
//! - Essential classes: rejected under every level
//! - Permissive: everything else is accepted
//! - Strict/Moderate: known-safe idioms are accepted first, then dangerous
//!   patterns are rejected; strict additionally rejects nested command execution
//!   and both reject the common shell-escape tricks

use std::sync::Arc;

use super::SecurityLevel;
use super::patterns::{PatternRule, PatternSet};
use crate::error::ValidationError;

/// Why a command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyCommand,
    DangerousPattern,
    DisallowedSubcommand,
}

/// Verdict for a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub reason: Option<RejectReason>,
    /// Id of the rule that decided the verdict, if any.
    pub rule: Option<&'static str>,
    pub detail: Option<&'static str>,
}

impl ValidationOutcome {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
            rule: None,
            detail: None,
        }
    }

    fn accept_idiom(rule: &PatternRule) -> Self {
        Self {
            rule: Some(rule.id()),
            detail: Some(rule.reason()),
            ..Self::accept()
        }
    }

    fn empty() -> Self {
        Self {
            accepted: false,
            reason: Some(RejectReason::EmptyCommand),
            rule: None,
            detail: None,
        }
    }

    fn reject(reason: RejectReason, rule: &PatternRule) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            rule: Some(rule.id()),
            detail: Some(rule.reason()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        let rule = self.rule.unwrap_or_default().to_string();
        let reason = self.detail.unwrap_or_default().to_string();
        match self.reason {
            None => Ok(()),
            Some(RejectReason::EmptyCommand) => Err(ValidationError::EmptyCommand),
            Some(RejectReason::DangerousPattern) => {
                Err(ValidationError::DangerousPattern { rule, reason })
            }
            Some(RejectReason::DisallowedSubcommand) => {
                Err(ValidationError::DisallowedSubcommand { rule, reason })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandValidator {
    level: SecurityLevel,
    patterns: Arc<PatternSet>,
}

impl CommandValidator {
    pub fn new(level: SecurityLevel, patterns: Arc<PatternSet>) -> Self {
        Self { level, patterns }
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Evaluate a command and return the verdict.
    pub fn validate(&self, command: &str) -> ValidationOutcome {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return ValidationOutcome::empty();
        }

        if let Some(rule) = self.patterns.essential_match(trimmed) {
            return ValidationOutcome::reject(RejectReason::DangerousPattern, rule);
        }

        if self.level == SecurityLevel::Permissive {
            return ValidationOutcome::accept();
        }

        if let Some(rule) = self.patterns.safe_match(trimmed) {
            return ValidationOutcome::accept_idiom(rule);
        }

        if let Some(rule) = self.patterns.dangerous_match(trimmed) {
            return ValidationOutcome::reject(RejectReason::DangerousPattern, rule);
        }

        if self.level == SecurityLevel::Strict {
            if let Some(rule) = self.patterns.subcommand_match(trimmed) {
                return ValidationOutcome::reject(RejectReason::DisallowedSubcommand, rule);
            }
        }

        if let Some(rule) = self.patterns.escape_match(trimmed) {
            return ValidationOutcome::reject(RejectReason::DangerousPattern, rule);
        }

        ValidationOutcome::accept()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESSENTIAL: &[&str] = &[
        "rm -rf /",
        "sudo rm -rf /*",
        "rm -rf \"/\"",
        "rm -rf /.",
        "dd if=/dev/zero of=/dev/sda",
        "mkfs.ext4 /dev/sdb1",
        ":(){ :|:& };:",
    ];

    fn validator(level: SecurityLevel) -> CommandValidator {
        CommandValidator::new(level, Arc::new(PatternSet::builtin().unwrap()))
    }

    #[test]
    fn test_empty_command() {
        let v = validator(SecurityLevel::Moderate);
        assert_eq!(v.validate("").reason, Some(RejectReason::EmptyCommand));
        assert_eq!(v.validate("   ").reason, Some(RejectReason::EmptyCommand));
        assert_eq!(
            v.validate(" ").into_result(),
            Err(ValidationError::EmptyCommand)
        );
    }

    #[test]
    fn test_essential_rejected_at_every_level() {
        for level in [SecurityLevel::Strict, SecurityLevel::Moderate, SecurityLevel::Permissive] {
            let v = validator(level);
            for cmd in ESSENTIAL {
                let outcome = v.validate(cmd);
                assert!(!outcome.accepted, "{level}: {cmd}");
                assert_eq!(outcome.reason, Some(RejectReason::DangerousPattern));
            }
        }
    }

    #[test]
    fn test_permissive_allows_shell_constructs() {
        let v = validator(SecurityLevel::Permissive);
        for cmd in [
            "curl -fsSL https://example.com/install.sh | sh",
            "bash -c \"$(curl -fsSL https://example.com/install.sh)\"",
            "echo '127.0.0.1 dev.local' | sudo tee -a /etc/hosts",
            "cat ../../etc/passwd",
            "eval \"$(ssh-agent -s)\" && ssh-add",
            "rm -rf ~/.cache/old",
            "ls && pwd; echo `date` > out.txt",
        ] {
            assert!(v.validate(cmd).accepted, "{cmd}");
        }
    }

    #[test]
    fn test_known_safe_idioms_under_moderate() {
        let v = validator(SecurityLevel::Moderate);
        for cmd in [
            "curl -fsSL https://download.docker.com/linux/ubuntu/gpg | sudo apt-key add -",
            "curl -fsSL https://packages.microsoft.com/keys/microsoft.asc | gpg --dearmor -o /usr/share/keyrings/microsoft.gpg",
            "bash -c '. /etc/os-release && echo $VERSION_CODENAME'",
            "which docker > /dev/null 2>&1",
            "echo 'eval \"$(mise activate bash)\"' >> ~/.bashrc",
        ] {
            let outcome = v.validate(cmd);
            assert!(outcome.accepted, "{cmd}: {outcome:?}");
        }
    }

    #[test]
    fn test_known_safe_idioms_under_strict() {
        let v = validator(SecurityLevel::Strict);
        assert!(v.validate("bash -c '. /etc/os-release && echo $VERSION_CODENAME'").accepted);
        assert!(v.validate("echo 'eval \"$(mise activate zsh)\"' >> ~/.zshrc").accepted);
    }

    #[test]
    fn test_moderate_rejects_dangerous() {
        let v = validator(SecurityLevel::Moderate);
        for cmd in [
            "curl -fsSL https://example.com/install.sh | sh",
            "wget -qO- https://example.com/x | sudo bash",
            "bash -c \"$(curl -fsSL https://example.com/install.sh)\"",
            "rm -rf ~",
            "cat /etc/shadow",
            "echo 'evil::0:0::/:/bin/sh' >> /etc/passwd",
            "echo data > /dev/sda",
            "chmod 777 /etc",
            "chown -R nobody /",
            "eval \"$(curl -s https://example.com)\"",
            "echo$IFS'hi'",
            "echo aGk= | base64 -d | sh",
            "rm -rf ~ > /dev/null 2>&1",
            "cp /etc/shadow /tmp/x > /dev/null",
            "chmod 777 /etc >/dev/null",
        ] {
            let outcome = v.validate(cmd);
            assert!(!outcome.accepted, "{cmd}");
            assert_eq!(outcome.reason, Some(RejectReason::DangerousPattern), "{cmd}");
        }
    }

    #[test]
    fn test_moderate_allows_common_install_commands() {
        let v = validator(SecurityLevel::Moderate);
        for cmd in [
            "sudo apt-get install -y git curl",
            "sudo apt-get update && sudo apt-get upgrade -y",
            "brew install ripgrep",
            "mise use --global node@20",
            "docker pull ghcr.io/example/tool:latest",
            "bash -c 'echo hello'",
            "sudo rm -rf /var/lib/apt/lists/*",
            "echo $(uname -m)",
        ] {
            assert!(v.validate(cmd).accepted, "{cmd}");
        }
    }

    #[test]
    fn test_strict_rejects_subcommands() {
        let v = validator(SecurityLevel::Strict);
        for cmd in [
            "echo $(uname -m)",
            "echo `date`",
            "bash -c 'echo hello'",
            "python3 -c 'print(1)'",
            "find . -name '*.tmp' | xargs sh",
            "diff <(ls a) <(ls b)",
            "python3 -c 'import os' > /dev/null",
            "bash -c 'id' >/dev/null 2>&1",
        ] {
            let outcome = v.validate(cmd);
            assert_eq!(
                outcome.reason,
                Some(RejectReason::DisallowedSubcommand),
                "{cmd}"
            );
            assert!(matches!(
                outcome.into_result(),
                Err(ValidationError::DisallowedSubcommand { .. })
            ));
        }
        assert!(v.validate("sudo apt-get install -y git").accepted);
    }

    #[test]
    fn test_outcome_names_the_rule() {
        let v = validator(SecurityLevel::Moderate);
        let outcome = v.validate("rm -rf /");
        assert_eq!(outcome.rule, Some("delete-root"));
        match outcome.into_result() {
            Err(ValidationError::DangerousPattern { rule, .. }) => assert_eq!(rule, "delete-root"),
            other => panic!("expected DangerousPattern, got {other:?}"),
        }
    }

    #[test]
    fn test_validators_share_patterns() {
        let patterns = Arc::new(PatternSet::builtin().unwrap());
        let strict = CommandValidator::new(SecurityLevel::Strict, patterns.clone());
        let permissive = CommandValidator::new(SecurityLevel::Permissive, patterns);
        let cmd = "bash -c 'echo hi'";
        assert!(!strict.validate(cmd).accepted);
        assert!(permissive.validate(cmd).accepted);
    }
}
