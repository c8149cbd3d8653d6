//! Notifications published by the installer.
//!
//! The installer never renders anything itself. It publishes [`InstallEvent`]s
//! into an unbounded channel and whoever owns the receiving end (the CLI
//! console, a TUI, a test) decides how to display them and how to answer
//! password prompts.
//!
//! Unbounded is appropriate here because:
//! 1. Output lines are produced at the pace of the child process
//! 2. Publishing must never block an output pump
//! 3. Events are small and short-lived

use std::fmt;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::debug;

use crate::security::SecretBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Where a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
    Installer,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
            Self::Installer => write!(f, "installer"),
        }
    }
}

/// One output line or status message.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: LogLevel,
    pub source: LogSource,
    pub app: String,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl LogEvent {
    pub fn new(level: LogLevel, source: LogSource, app: &str, text: impl Into<String>) -> Self {
        Self {
            level,
            source,
            app: app.to_string(),
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

/// A pending password prompt. Answer it with [`InputRequest::respond`];
/// dropping it without answering abandons the prompt.
pub struct InputRequest {
    pub app: String,
    pub prompt: String,
    responder: oneshot::Sender<String>,
}

impl InputRequest {
    pub(crate) fn new(app: &str, prompt: &str) -> (Self, oneshot::Receiver<String>) {
        let (responder, reply) = oneshot::channel();
        (
            Self {
                app: app.to_string(),
                prompt: prompt.to_string(),
                responder,
            },
            reply,
        )
    }

    /// Deliver the reply. Returns false if the installer stopped waiting;
    /// the undelivered reply is wiped.
    pub fn respond(self, reply: String) -> bool {
        self.try_respond(reply).is_ok()
    }

    /// Like [`respond`](Self::respond), but hands an undelivered reply back
    /// as a [`SecretBuffer`] so it is zeroed when dropped.
    pub fn try_respond(self, reply: String) -> Result<(), SecretBuffer> {
        self.responder
            .send(reply)
            .map_err(|unsent| SecretBuffer::from_bytes(unsent.into_bytes()))
    }

    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }
}

impl fmt::Debug for InputRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRequest")
            .field("app", &self.app)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum InstallEvent {
    Log(LogEvent),
    AppStarted {
        name: String,
        index: usize,
        total: usize,
    },
    AppComplete {
        name: String,
        error: Option<String>,
    },
    InputRequest(InputRequest),
}

/// Sending half handed to the installer.
pub type EventSink = UnboundedSender<InstallEvent>;

pub fn init_event_channel() -> (EventSink, UnboundedReceiver<InstallEvent>) {
    mpsc::unbounded_channel()
}

/// Publish without caring whether anyone is still listening.
pub(crate) fn publish(sink: &EventSink, event: InstallEvent) {
    if sink.send(event).is_err() {
        debug!("event receiver dropped; discarding event");
    }
}
