//! Reading a password from the controlling terminal without echo.

use std::io::{self, BufRead, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::utils::context::Context;

/// Show `prompt` and read one line with echo disabled.
///
/// Ctrl-C and Esc give `ErrorKind::Interrupted`. When the terminal cannot
/// enter raw mode (stdin is not a tty) a plain line is read instead.
pub fn read_password(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{} ", prompt)?;
    stderr.flush()?;

    if let Err(e) = terminal::enable_raw_mode() {
        debug!("raw mode unavailable ({}), reading a plain line", e);
        return read_plain_line();
    }
    let _restore = Context::with(|| {
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Failed to restore terminal mode: {}", e);
        }
    });

    // wiped on drop
    let mut input = Zeroizing::new(String::with_capacity(128));
    let result = read_keys(&mut input);
    // raw mode swallows the newline
    write!(stderr, "\r\n")?;

    result.map(|()| std::mem::take(&mut *input))
}

fn read_keys(input: &mut String) -> io::Result<()> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(()),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled by user"));
            }
            KeyCode::Esc => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt dismissed"));
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
    }
}

fn read_plain_line() -> io::Result<String> {
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line)
}
