//! Per-application install phases.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::InstallError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    Validating,
    PreInstall,
    DependencyCheck,
    Installing,
    PostInstall,
    ThemeApply,
    Registering,
    Done,
    Failed(String),
}

impl Phase {
    fn rank(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Validating => 1,
            Self::PreInstall => 2,
            Self::DependencyCheck => 3,
            Self::Installing => 4,
            Self::PostInstall => 5,
            Self::ThemeApply => 6,
            Self::Registering => 7,
            Self::Done => 8,
            Self::Failed(_) => 9,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Validating => write!(f, "validating"),
            Self::PreInstall => write!(f, "pre-install"),
            Self::DependencyCheck => write!(f, "dependency-check"),
            Self::Installing => write!(f, "installing"),
            Self::PostInstall => write!(f, "post-install"),
            Self::ThemeApply => write!(f, "theme-apply"),
            Self::Registering => write!(f, "registering"),
            Self::Done => write!(f, "done"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One application's install attempt.
#[derive(Debug)]
pub struct RunningInstall {
    app: String,
    phase: Phase,
    started: Instant,
    last_error: Option<String>,
}

impl RunningInstall {
    pub fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            phase: Phase::Init,
            started: Instant::now(),
            last_error: None,
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Move forward to `next`. Phases are never re-entered and nothing
    /// leaves a terminal phase.
    pub fn advance(&mut self, next: Phase) -> Result<(), InstallError> {
        if matches!(next, Phase::Failed(_)) {
            return Err(InstallError::Transition(format!(
                "{}: use fail() to enter the failed phase",
                self.app
            )));
        }
        if self.phase.is_terminal() || next.rank() <= self.phase.rank() {
            return Err(InstallError::Transition(format!(
                "{}: {} -> {}",
                self.app, self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    /// Enter `Failed`. A second failure keeps the first reason.
    pub fn fail(&mut self, reason: &str) {
        if self.phase.is_terminal() {
            return;
        }
        self.last_error = Some(reason.to_string());
        self.phase = Phase::Failed(reason.to_string());
    }
}
