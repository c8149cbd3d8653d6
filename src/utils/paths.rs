//! `~` expansion for config paths.

use std::path::{Path, PathBuf};

/// The current user's home directory from `HOME`.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` or `~/` against `HOME`.
pub fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, home_dir().as_deref())
}

/// Expand a leading `~` against `home`. Paths without one, `~user` forms and
/// a missing home are returned unchanged.
pub fn expand_tilde_with(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_with_home() {
        let home = Path::new("/home/dev");
        assert_eq!(
            expand_tilde_with("~/.config/kitty/theme.conf", Some(home)),
            PathBuf::from("/home/dev/.config/kitty/theme.conf")
        );
        assert_eq!(expand_tilde_with("~", Some(home)), PathBuf::from("/home/dev"));
    }

    #[test]
    fn test_untouched_paths() {
        let home = Path::new("/home/dev");
        assert_eq!(expand_tilde_with("/etc/hosts", Some(home)), PathBuf::from("/etc/hosts"));
        assert_eq!(expand_tilde_with("themes/a~b", Some(home)), PathBuf::from("themes/a~b"));
        assert_eq!(expand_tilde_with("~root/x", Some(home)), PathBuf::from("~root/x"));
        assert_eq!(expand_tilde_with("~/x", None), PathBuf::from("~/x"));
    }
}
