//! Child output pumps.
//!
//! A pump reads one child stream until EOF or cancellation, splits it into
//! lines and forwards each cleaned line to the event sink. Both `\n` and a
//! bare `\r` end a line so in-place progress updates show up as they happen.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::{EventSink, InstallEvent, LogEvent, LogLevel, LogSource, publish};

const READ_BUFFER: usize = 8192;

/// Incremental splitter over raw bytes.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
    // A `\r` ended the previous line; a directly following `\n` belongs to it.
    after_cr: bool,
}

impl LineSplitter {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => lines.push(self.take_line()),
                b'\r' => {
                    lines.push(self.take_line());
                    self.after_cr = true;
                }
                _ => self.pending.push(byte),
            }
        }
        lines
    }

    /// Whatever is left after EOF.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Strip ANSI escape codes from text.
/// Removes color codes, cursor movements, OSC titles and charset selections.
pub(crate) fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            result.push(ch);
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                // CSI ends with a byte in 0x40..=0x7E
                for next_ch in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next_ch) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                // OSC ends with BEL or ST (ESC \)
                while let Some(next_ch) = chars.next() {
                    if next_ch == '\x07' {
                        break;
                    }
                    if next_ch == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some('(') | Some(')') => {
                chars.next();
                chars.next();
            }
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }

    result
}

/// Read `reader` to the end, forwarding lines as [`LogEvent`]s.
///
/// When `prompts` is set, every raw chunk is also handed to the password
/// watcher so prompts without a trailing newline are still seen.
pub(crate) async fn pump_output<R>(
    mut reader: R,
    source: LogSource,
    app: String,
    sink: EventSink,
    mut prompts: Option<UnboundedSender<String>>,
    token: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER];
    let mut splitter = LineSplitter::default();

    loop {
        let n = tokio::select! {
            _ = token.cancelled() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("{} read error for {}: {}", source, app, e);
                    break;
                }
            },
        };

        let chunk = &buf[..n];
        if let Some(tx) = &prompts {
            if tx.send(String::from_utf8_lossy(chunk).into_owned()).is_err() {
                prompts = None;
            }
        }
        for line in splitter.push(chunk) {
            emit_line(&sink, source, &app, &line);
        }
    }

    if let Some(line) = splitter.finish() {
        emit_line(&sink, source, &app, &line);
    }
}

fn emit_line(sink: &EventSink, source: LogSource, app: &str, raw: &str) {
    let text = strip_ansi_codes(raw);
    if text.trim().is_empty() {
        return;
    }
    debug!(target: "child_output", "[{}] {}: {}", app, source, text);
    publish(
        sink,
        InstallEvent::Log(LogEvent::new(LogLevel::Info, source, app, text)),
    );
}
