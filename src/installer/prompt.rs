//! Password prompt mediation.
//!
//! The watcher reads raw stderr chunks from the pump and checks each
//! completed line, then the current unfinished one. When a line looks like a
//! password prompt it asks the event sink for a reply. The reply is sanitized into a
//! [`SecretBuffer`], written to the child's stdin under the stdin lock and
//! cleared straight away. Only one request is outstanding at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroize;

use super::pump::strip_ansi_codes;
use crate::event::{EventSink, InputRequest, InstallEvent, LogEvent, LogLevel, LogSource, publish};
use crate::security::SecretBuffer;

/// Longest unfinished line kept while waiting for a prompt.
const MAX_PROMPT_TAIL: usize = 512;

/// Child stdin shared between the watcher and whoever closes it.
pub(crate) type SharedStdin<W> = Arc<Mutex<Option<W>>>;

/// Best-effort check: "password" together with "sudo", "enter" or a
/// trailing colon.
pub fn looks_like_password_prompt(text: &str) -> bool {
    let lower = text.to_lowercase();
    if !lower.contains("password") {
        return false;
    }
    lower.contains("sudo") || lower.contains("enter") || lower.trim_end().ends_with(':')
}

/// Strip NULs and control characters other than tab and newline, then trim.
///
/// The input is consumed and zeroed; the only surviving copy of the secret
/// is the returned buffer.
pub fn sanitize_reply(raw: String) -> SecretBuffer {
    let mut raw = raw.into_bytes();
    let mut cleaned: Vec<u8> = Vec::with_capacity(raw.len());
    let mut utf8 = [0u8; 4];

    for c in String::from_utf8_lossy(&raw).chars() {
        if c.is_control() && c != '\t' && c != '\n' {
            continue;
        }
        cleaned.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }
    utf8.zeroize();
    raw.zeroize();

    let (start, end) = match std::str::from_utf8(&cleaned) {
        Ok(text) => {
            let start = text.len() - text.trim_start().len();
            (start, text.trim_end().len().max(start))
        }
        Err(_) => (0, cleaned.len()),
    };
    cleaned.copy_within(start..end, 0);
    let len = end - start;
    cleaned[len..].zeroize();
    cleaned.truncate(len);

    SecretBuffer::from_bytes(cleaned)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relay {
    Written,
    TimedOut,
    Abandoned,
    Cancelled,
    WriteFailed,
}

/// Run until the chunk stream ends or `token` fires. Returns how many
/// replies were written to stdin.
pub(crate) async fn watch_prompts<W>(
    mut chunks: UnboundedReceiver<String>,
    stdin: SharedStdin<W>,
    sink: EventSink,
    app: String,
    reply_timeout: Duration,
    token: CancellationToken,
) -> usize
where
    W: AsyncWrite + Unpin + Send,
{
    let mut tail = String::new();
    let mut written = 0;

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => break,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        tail.push_str(&chunk);
        let Some(prompt) = take_prompt(&mut tail) else {
            continue;
        };

        let prompt = strip_ansi_codes(prompt.trim());
        match relay_password(&stdin, &sink, &app, &prompt, reply_timeout, &token).await {
            Relay::Written => written += 1,
            Relay::Cancelled => break,
            Relay::TimedOut | Relay::Abandoned | Relay::WriteFailed => {}
        }
    }

    written
}

/// Consume completed lines from `tail` and return the first that looks like
/// a prompt, falling back to the unfinished remainder. Completed lines that
/// follow a matched prompt are dropped.
fn take_prompt(tail: &mut String) -> Option<String> {
    let mut prompt = None;
    while let Some(pos) = tail.find(['\n', '\r']) {
        let line: String = tail.drain(..=pos).collect();
        if prompt.is_none() && looks_like_password_prompt(&line) {
            prompt = Some(line);
        }
    }
    if prompt.is_some() {
        return prompt;
    }

    if tail.len() > MAX_PROMPT_TAIL {
        tail.clear();
        return None;
    }
    if looks_like_password_prompt(tail) {
        return Some(std::mem::take(tail));
    }
    None
}

async fn relay_password<W>(
    stdin: &SharedStdin<W>,
    sink: &EventSink,
    app: &str,
    prompt: &str,
    reply_timeout: Duration,
    token: &CancellationToken,
) -> Relay
where
    W: AsyncWrite + Unpin + Send,
{
    info!("password prompt detected for {}", app);
    let (request, reply) = InputRequest::new(app, prompt);
    publish(sink, InstallEvent::InputRequest(request));

    let raw = tokio::select! {
        _ = token.cancelled() => {
            info!("password prompt for {} abandoned: cancelled", app);
            return Relay::Cancelled;
        }
        reply = tokio::time::timeout(reply_timeout, reply) => match reply {
            Ok(Ok(raw)) => raw,
            Ok(Err(_)) => {
                report(sink, app, LogLevel::Warn, "password prompt was dismissed");
                return Relay::Abandoned;
            }
            Err(_) => {
                report(
                    sink,
                    app,
                    LogLevel::Warn,
                    &format!("no password entered within {:?}", reply_timeout),
                );
                return Relay::TimedOut;
            }
        },
    };

    let mut secret = sanitize_reply(raw);
    match write_and_clear(stdin, &mut secret).await {
        Ok(len) => {
            info!("wrote {} byte password reply for {}", len, app);
            Relay::Written
        }
        Err(e) => {
            warn!("failed to write password reply for {}: {}", app, e);
            report(sink, app, LogLevel::Error, &format!("could not send password: {}", e));
            Relay::WriteFailed
        }
    }
}

/// Write the secret and a newline, then clear it whatever the outcome.
/// Returns the number of secret bytes written.
async fn write_and_clear<W>(
    stdin: &SharedStdin<W>,
    secret: &mut SecretBuffer,
) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin + Send,
{
    let len = secret.len();
    let result = write_secret(stdin, secret).await;
    secret.clear();
    result.map(|()| len)
}

async fn write_secret<W>(stdin: &SharedStdin<W>, secret: &SecretBuffer) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut guard = stdin.lock().await;
    let writer = guard
        .as_mut()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed"))?;
    writer.write_all(secret.expose()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn report(sink: &EventSink, app: &str, level: LogLevel, text: &str) {
    publish(
        sink,
        InstallEvent::Log(LogEvent::new(level, LogSource::Installer, app, text)),
    );
}
