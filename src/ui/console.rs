//! Line-oriented console front end.
//!
//! Prints install events as they arrive and answers password prompts from
//! the terminal. Runs until every event sender is gone.

use std::io;

use crossterm::style::Stylize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::password::read_password;
use crate::event::{InputRequest, InstallEvent, LogEvent, LogLevel, LogSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOptions {
    /// Also print debug-level events such as phase changes.
    pub verbose: bool,
    pub color: bool,
}

/// Render `event` as one line, or nothing when it is filtered out.
pub fn format_event(event: &InstallEvent, options: ConsoleOptions) -> Option<String> {
    match event {
        InstallEvent::Log(log) => format_log(log, options),
        InstallEvent::AppStarted { name, index, total } => {
            let line = format!("==> [{}/{}] {}", index + 1, total, name);
            Some(paint(line, options, |s| s.bold().to_string()))
        }
        InstallEvent::AppComplete { name, error: None } => Some(paint(
            format!("[ok] {} installed", name),
            options,
            |s| s.green().to_string(),
        )),
        InstallEvent::AppComplete {
            name,
            error: Some(reason),
        } => Some(paint(
            format!("[failed] {}: {}", name, reason),
            options,
            |s| s.red().to_string(),
        )),
        InstallEvent::InputRequest(_) => None,
    }
}

fn format_log(log: &LogEvent, options: ConsoleOptions) -> Option<String> {
    if log.level == LogLevel::Debug && !options.verbose {
        return None;
    }
    let prefix = match log.source {
        LogSource::Stdout => "   ",
        LogSource::Stderr => " ! ",
        LogSource::Installer => " * ",
    };
    let line = format!(
        "{} {}{}| {}",
        log.timestamp.format("%H:%M:%S"),
        log.app,
        prefix,
        log.text
    );
    Some(match log.level {
        LogLevel::Error => paint(line, options, |s| s.red().to_string()),
        LogLevel::Warn => paint(line, options, |s| s.yellow().to_string()),
        LogLevel::Debug => paint(line, options, |s| s.dark_grey().to_string()),
        LogLevel::Info => line,
    })
}

fn paint(line: String, options: ConsoleOptions, style: impl FnOnce(&str) -> String) -> String {
    if options.color { style(&line) } else { line }
}

/// Print events until the channel closes. Ctrl-C at a password prompt
/// cancels `token`.
pub async fn run_console(
    mut events: UnboundedReceiver<InstallEvent>,
    token: CancellationToken,
    options: ConsoleOptions,
) {
    while let Some(event) = events.recv().await {
        match event {
            InstallEvent::InputRequest(request) => answer(request, &token).await,
            other => {
                if let Some(line) = format_event(&other, options) {
                    println!("{}", line);
                }
            }
        }
    }
}

async fn answer(request: InputRequest, token: &CancellationToken) {
    let app = request.app.clone();
    let prompt = format!("[{}] {}", request.app, request.prompt);
    let reply = tokio::task::spawn_blocking(move || read_password(&prompt)).await;

    match reply {
        Ok(Ok(password)) => {
            if let Err(mut rejected) = request.try_respond(password) {
                rejected.clear();
                warn!("password prompt for {} expired before the reply", app);
                eprintln!("password prompt expired; the command may time out");
            }
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {
            info!("password prompt interrupted: {}", e);
            token.cancel();
        }
        Ok(Err(e)) => {
            warn!("could not read password: {}", e);
            eprintln!("could not read password: {}", e);
        }
        Err(e) => warn!("password reader task failed: {}", e),
    }
}
