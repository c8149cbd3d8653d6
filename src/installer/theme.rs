//! Theme selection and file placement.

use std::path::{Path, PathBuf};

use super::model::Theme;
use crate::utils::paths::expand_tilde_with;

/// Repository key holding the chosen theme for `app`.
pub fn theme_key(app: &str) -> String {
    format!("theme:{}", app)
}

/// The stored preference when it names a known theme, otherwise the first one.
pub fn select_theme<'a>(themes: &'a [Theme], preferred: Option<&str>) -> Option<&'a Theme> {
    preferred
        .and_then(|name| themes.iter().find(|theme| theme.name == name))
        .or_else(|| themes.first())
}

/// Copy the theme file into place, creating parent directories.
pub async fn copy_theme(theme: &Theme, home: Option<&Path>) -> std::io::Result<PathBuf> {
    let source = expand_tilde_with(&theme.source, home);
    let destination = expand_tilde_with(&theme.destination, home);
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::copy(&source, &destination).await?;
    Ok(destination)
}
