//! Application descriptions as they appear in the app list file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub method: InstallMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_install: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_install: Vec<Step>,
    /// Package repositories to configure before installing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<Theme>,
}

impl AppConfig {
    pub fn new(name: &str, method: InstallMethod) -> Self {
        Self {
            name: name.to_string(),
            method,
            pre_install: Vec::new(),
            post_install: Vec::new(),
            sources: Vec::new(),
            themes: Vec::new(),
        }
    }

    pub fn with_pre_install(mut self, step: Step) -> Self {
        self.pre_install.push(step);
        self
    }

    pub fn with_post_install(mut self, step: Step) -> Self {
        self.post_install.push(step);
        self
    }

    pub fn with_source(mut self, source: SourceDescriptor) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.themes.push(theme);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallMethod {
    Apt { packages: Vec<String> },
    Dnf { packages: Vec<String> },
    Pacman { packages: Vec<String> },
    Brew { packages: Vec<String> },
    /// Remote install script, run through the download guard.
    CurlPipe { url: String },
    Container { image: String },
    VersionManager {
        tool: String,
        #[serde(default = "latest")]
        version: String,
    },
    Generic { commands: Vec<String> },
}

fn latest() -> String {
    "latest".to_string()
}

impl InstallMethod {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Apt { .. } => "apt",
            Self::Dnf { .. } => "dnf",
            Self::Pacman { .. } => "pacman",
            Self::Brew { .. } => "brew",
            Self::CurlPipe { .. } => "curl_pipe",
            Self::Container { .. } => "container",
            Self::VersionManager { .. } => "version_manager",
            Self::Generic { .. } => "generic",
        }
    }
}

/// One pre- or post-install item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Command(String),
    /// Always run through `bash -c`.
    Shell(String),
    Copy { from: String, to: String },
    DelayMs(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Used for the keyring and `.list` file names.
    pub name: String,
    pub key_url: String,
    #[serde(default)]
    pub dearmor: bool,
    pub repo_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub source: String,
    pub destination: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_app_from_json() {
        let app: AppConfig = serde_json::from_str(
            r#"{
                "name": "vscode",
                "method": {"type": "apt", "packages": ["code"]},
                "pre_install": [
                    {"command": "sudo apt-get update"},
                    {"delay_ms": 250},
                    {"shell": "mkdir -p ~/.config/Code && true"}
                ],
                "post_install": [{"copy": {"from": "configs/settings.json", "to": "~/.config/Code/User/settings.json"}}],
                "sources": [{
                    "name": "vscode",
                    "key_url": "https://packages.microsoft.com/keys/microsoft.asc",
                    "dearmor": true,
                    "repo_line": "deb [arch=amd64] https://packages.microsoft.com/repos/code stable main"
                }],
                "themes": [{"name": "nord", "source": "themes/nord.json", "destination": "~/.config/Code/nord.json"}]
            }"#,
        )
        .unwrap();

        assert_eq!(app.method.kind(), "apt");
        assert_eq!(app.pre_install[1], Step::DelayMs(250));
        assert!(matches!(&app.post_install[0], Step::Copy { to, .. } if to.starts_with('~')));
        assert!(app.sources[0].dearmor);
        assert_eq!(app.themes[0].name, "nord");
    }

    #[test]
    fn test_version_defaults_to_latest() {
        let method: InstallMethod =
            serde_json::from_str(r#"{"type": "version_manager", "tool": "node"}"#).unwrap();
        assert_eq!(
            method,
            InstallMethod::VersionManager {
                tool: "node".to_string(),
                version: "latest".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let result: Result<InstallMethod, _> =
            serde_json::from_str(r#"{"type": "snap", "packages": ["x"]}"#);
        assert!(result.is_err());
    }
}
