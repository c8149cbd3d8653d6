//! Turns an [`AppConfig`] into the concrete commands each phase runs.

use std::path::Path;
use std::time::Duration;

use super::model::{AppConfig, InstallMethod, SourceDescriptor, Step};
use crate::error::InstallError;
use crate::utils::paths::expand_tilde_with;

const KEYRING_DIR: &str = "/usr/share/keyrings";
const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCommand {
    /// Parsed normally; shell operators route it through `bash -c`.
    Run(String),
    /// Always run through `bash -c`.
    Shell(String),
    /// Interruptible pause between commands.
    Delay(Duration),
    /// Remote script URL for the download guard.
    RemoteScript(String),
}

impl PlannedCommand {
    /// The text the command validator sees, if any.
    pub fn command_text(&self) -> Option<&str> {
        match self {
            Self::Run(command) | Self::Shell(command) => Some(command),
            Self::Delay(_) | Self::RemoteScript(_) => None,
        }
    }
}

/// Structural checks that need no validator and no network.
pub fn check_app(app: &AppConfig) -> Result<(), InstallError> {
    let invalid = |reason: String| InstallError::InvalidApp {
        app: app.name.clone(),
        reason,
    };

    if app.name.trim().is_empty() {
        return Err(invalid("name is empty".to_string()));
    }

    match &app.method {
        InstallMethod::Apt { packages }
        | InstallMethod::Dnf { packages }
        | InstallMethod::Pacman { packages }
        | InstallMethod::Brew { packages } => {
            if packages.is_empty() {
                return Err(invalid("no packages listed".to_string()));
            }
            for package in packages {
                check_word("package", package).map_err(invalid)?;
            }
        }
        InstallMethod::CurlPipe { url } => check_word("url", url).map_err(invalid)?,
        InstallMethod::Container { image } => check_word("image", image).map_err(invalid)?,
        InstallMethod::VersionManager { tool, version } => {
            check_word("tool", tool).map_err(invalid)?;
            check_word("version", version).map_err(invalid)?;
        }
        InstallMethod::Generic { commands } => {
            if commands.iter().all(|c| c.trim().is_empty()) {
                return Err(invalid("no commands listed".to_string()));
            }
        }
    }

    for source in &app.sources {
        check_source(source).map_err(invalid)?;
    }

    for step in app.pre_install.iter().chain(&app.post_install) {
        if let Step::Copy { from, to } = step {
            check_word("copy source", from).map_err(invalid)?;
            check_word("copy destination", to).map_err(invalid)?;
        }
    }

    Ok(())
}

/// Characters that would route a planned command through `bash -c`.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '<', '>', '$', '`', '\'', '"', '(', ')', '\\', '*', '?', '{', '}', '!',
];

/// Arguments must stay single plain words so the planned command is split
/// into argv and never reaches a shell.
fn check_word(what: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is empty", what));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("{} '{}' contains whitespace", what, value.escape_debug()));
    }
    if value.contains(SHELL_METACHARACTERS) {
        return Err(format!("{} '{}' contains shell metacharacters", what, value));
    }
    if value.starts_with('-') {
        return Err(format!("{} '{}' looks like an option", what, value));
    }
    Ok(())
}

fn check_source(source: &SourceDescriptor) -> Result<(), String> {
    let name_ok = !source.name.is_empty()
        && source
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !source.name.starts_with('.');
    if !name_ok {
        return Err(format!("source name '{}' is not a plain file name", source.name));
    }
    check_word("key url", &source.key_url)?;
    if source.repo_line.trim().is_empty() {
        return Err(format!("source '{}' has an empty repo line", source.name));
    }
    if source.repo_line.contains(['\'', '\n', '\r']) {
        return Err(format!("source '{}' repo line has quotes or newlines", source.name));
    }
    Ok(())
}

/// Pre- or post-install steps, in order.
pub fn plan_steps(steps: &[Step], home: Option<&Path>) -> Vec<PlannedCommand> {
    steps
        .iter()
        .map(|step| match step {
            Step::Command(command) => PlannedCommand::Run(command.clone()),
            Step::Shell(snippet) => PlannedCommand::Shell(snippet.clone()),
            Step::Copy { from, to } => PlannedCommand::Run(format!(
                "cp -r {} {}",
                expand_tilde_with(from, home).display(),
                expand_tilde_with(to, home).display()
            )),
            Step::DelayMs(ms) => PlannedCommand::Delay(Duration::from_millis(*ms)),
        })
        .collect()
}

/// Key import plus the `.list` entry for each package source.
pub fn plan_sources(sources: &[SourceDescriptor]) -> Vec<PlannedCommand> {
    let mut commands = Vec::with_capacity(sources.len() * 2);
    for source in sources {
        let key = if source.dearmor {
            format!(
                "curl -fsSL {} | sudo gpg --dearmor --yes -o {}/{}.gpg",
                source.key_url, KEYRING_DIR, source.name
            )
        } else {
            format!("curl -fsSL {} | sudo apt-key add -", source.key_url)
        };
        commands.push(PlannedCommand::Run(key));
        commands.push(PlannedCommand::Run(format!(
            "echo '{}' | sudo tee {}/{}.list > /dev/null",
            source.repo_line, SOURCES_DIR, source.name
        )));
    }
    commands
}

/// The main install step for a method.
pub fn plan_install(method: &InstallMethod) -> Vec<PlannedCommand> {
    match method {
        InstallMethod::Apt { packages } => {
            vec![package_command("sudo apt-get install -y", packages)]
        }
        InstallMethod::Dnf { packages } => vec![package_command("sudo dnf install -y", packages)],
        InstallMethod::Pacman { packages } => {
            vec![package_command("sudo pacman -S --noconfirm --needed", packages)]
        }
        InstallMethod::Brew { packages } => vec![package_command("brew install", packages)],
        InstallMethod::CurlPipe { url } => vec![PlannedCommand::RemoteScript(url.clone())],
        InstallMethod::Container { image } => {
            vec![PlannedCommand::Run(format!("docker pull {}", image))]
        }
        InstallMethod::VersionManager { tool, version } => vec![PlannedCommand::Run(format!(
            "mise use --global {}@{}",
            tool, version
        ))],
        InstallMethod::Generic { commands } => commands
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| PlannedCommand::Run(c.clone()))
            .collect(),
    }
}

fn package_command(prefix: &str, packages: &[String]) -> PlannedCommand {
    PlannedCommand::Run(format!("{} {}", prefix, packages.join(" ")))
}
