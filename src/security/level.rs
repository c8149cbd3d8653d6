use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Validation policy applied by a [`CommandValidator`](super::CommandValidator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Dangerous patterns plus any nested command execution.
    Strict,
    /// Dangerous patterns and the common shell-escape tricks.
    #[default]
    Moderate,
    /// Only the essential classes (delete root, disk overwrite, format, fork
    /// bomb). Meant for a trusted local operator; everything else passes.
    Permissive,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Moderate => write!(f, "moderate"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "moderate" => Ok(Self::Moderate),
            "permissive" => Ok(Self::Permissive),
            other => Err(format!(
                "unknown security level '{other}' (expected strict, moderate or permissive)"
            )),
        }
    }
}
