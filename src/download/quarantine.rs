//! Private temporary files for downloaded scripts.
//!
//! The file is created with owner-only permissions inside the OS temp
//! directory and removed when the [`Quarantine`] is dropped, whatever the
//! outcome of running it.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::DownloadError;

pub struct Quarantine {
    file: NamedTempFile,
    path: PathBuf,
}

impl Quarantine {
    /// Create an empty quarantine file for `app` inside `dir`.
    pub fn create_in(dir: &Path, app: &str) -> Result<Self, DownloadError> {
        let prefix = format!("rusty-installer-{}-", file_stem(app));
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".sh")
            .tempfile_in(dir)?;

        let root = std::fs::canonicalize(dir)?;
        let path = std::fs::canonicalize(file.path())?;
        if !path.starts_with(&root) || path.parent() != Some(root.as_path()) {
            return Err(DownloadError::PathEscape(path.display().to_string()));
        }
        if path.to_string_lossy().chars().any(char::is_whitespace) {
            return Err(DownloadError::Quarantine(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("temp path '{}' contains whitespace", path.display()),
            )));
        }

        Ok(Self { file, path })
    }

    /// Create in the OS temp directory.
    pub fn create(app: &str) -> Result<Self, DownloadError> {
        Self::create_in(&std::env::temp_dir(), app)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_all(&mut self, body: &[u8]) -> Result<(), DownloadError> {
        let file = self.file.as_file_mut();
        file.write_all(body)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}

/// App names end up in a file name; keep only a safe subset.
fn file_stem(app: &str) -> String {
    let stem: String = app
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(32)
        .collect();
    if stem.is_empty() { "app".to_string() } else { stem }
}
