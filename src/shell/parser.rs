//! Split a raw command into an executable form.

use crate::error::ParseError;

/// Tokens that require a real shell to interpret.
const SHELL_OPERATORS: &[&str] = &["|", "&", ";", ">", "<", ">>", "2>"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub executable: String,
    pub args: Vec<String>,
    pub needs_shell: bool,
}

impl ParsedCommand {
    /// Render back to a single line, for logs.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.executable.clone()
        } else {
            format!("{} {}", self.executable, self.args.join(" "))
        }
    }
}

pub fn needs_shell(command: &str) -> bool {
    SHELL_OPERATORS.iter().any(|op| command.contains(op))
}

/// Wrap a snippet for `bash -c` regardless of its content.
pub fn shell(command: &str) -> Result<ParsedCommand, ParseError> {
    if command.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(ParsedCommand {
        executable: "bash".to_string(),
        args: vec!["-c".to_string(), command.to_string()],
        needs_shell: true,
    })
}

/// Parse a command.
///
/// Anything containing a shell operator is handed to `bash -c` as one
/// untouched argument; everything else is split on whitespace.
pub fn parse(command: &str) -> Result<ParsedCommand, ParseError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    if needs_shell(trimmed) {
        return shell(command);
    }

    let mut parts = trimmed.split_whitespace().map(str::to_string);
    let executable = parts.next().ok_or(ParseError::Empty)?;
    Ok(ParsedCommand {
        executable,
        args: parts.collect(),
        needs_shell: false,
    })
}
