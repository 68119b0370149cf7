use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{COMMAND_CHANNEL_SIZE, SERIAL_TIMEOUT_SECS};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot open reader {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },
    #[error("terminal error: {0}")]
    Terminal(std::io::Error),
    #[error("reader read error: {0}")]
    Read(std::io::Error),
}

/// One keystroke from a keyboard-wedge card reader, stamped when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key { ch: char, at: Instant },
    Enter { at: Instant },
}

pub struct InputTransport {
    pub incoming_rx: mpsc::Receiver<InputEvent>,
    pub task: JoinHandle<Result<(), InputError>>,
}

/// Start reading card input on a blocking thread.
///
/// With `path` set the reader is a serial device opened in raw mode at
/// `baud_rate`. Otherwise an interactive stdin is switched to raw mode and
/// read key by key; a piped stdin is read byte by byte.
pub fn start_input_reader(
    path: Option<PathBuf>,
    baud_rate: u32,
) -> Result<InputTransport, InputError> {
    let (incoming_tx, incoming_rx) = mpsc::channel::<InputEvent>(COMMAND_CHANNEL_SIZE);

    let task = match path {
        Some(path) => {
            let name = path.to_string_lossy().into_owned();
            // serialport puts the line in raw (non-canonical) mode on open,
            // so bytes arrive as the reader sends them, not a line at a time.
            let port = serialport::new(name.as_str(), baud_rate)
                .timeout(Duration::from_secs(SERIAL_TIMEOUT_SECS))
                .open()
                .map_err(|source| InputError::Open {
                    path: name.clone(),
                    source,
                })?;
            tracing::info!(reader = %name, baud_rate, "Card reader input open");
            tokio::task::spawn_blocking(move || {
                pump_bytes(port, &incoming_tx, Instant::now)
            })
        }
        None if std::io::stdin().is_terminal() => {
            tracing::info!(reader = "terminal", "Card reader input open");
            tokio::task::spawn_blocking(move || pump_terminal(&incoming_tx))
        }
        None => {
            tracing::info!(reader = "stdin", "Card reader input open");
            tokio::task::spawn_blocking(move || {
                pump_bytes(std::io::stdin(), &incoming_tx, Instant::now)
            })
        }
    };

    Ok(InputTransport { incoming_rx, task })
}

/// Read `source` one byte at a time, stamping each byte with `now()` as it
/// is returned. Stops at end of input or when the receiver is gone.
pub fn pump_bytes<R, F>(
    mut source: R,
    tx: &mpsc::Sender<InputEvent>,
    mut now: F,
) -> Result<(), InputError>
where
    R: Read,
    F: FnMut() -> Instant,
{
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(e) => return Err(InputError::Read(e)),
        }
        let Some(event) = decode_byte(byte[0], now()) else {
            continue;
        };
        if tx.blocking_send(event).is_err() {
            return Ok(());
        }
    }
    tracing::info!("Card reader input closed");
    Ok(())
}

/// Map one raw reader byte to a key event. Line ends submit; other control
/// and non-ASCII bytes are dropped.
pub fn decode_byte(b: u8, at: Instant) -> Option<InputEvent> {
    match b {
        b'\n' | b'\r' => Some(InputEvent::Enter { at }),
        0x20..=0x7e => Some(InputEvent::Key { ch: b as char, at }),
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum KeyInput {
    Event(InputEvent),
    Quit,
}

/// Translate a terminal key press. Ctrl-C / Ctrl-D end input.
pub fn translate_key(key: KeyEvent, at: Instant) -> Option<KeyInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => Some(KeyInput::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Enter => Some(KeyInput::Event(InputEvent::Enter { at })),
        KeyCode::Char(ch) if ch.is_ascii() && !ch.is_ascii_control() => {
            Some(KeyInput::Event(InputEvent::Key { ch, at }))
        }
        _ => None,
    }
}

/// Restores cooked mode when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self, InputError> {
        crossterm::terminal::enable_raw_mode().map_err(InputError::Terminal)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            tracing::warn!("Cannot restore terminal mode: {e}");
        }
    }
}

fn pump_terminal(tx: &mpsc::Sender<InputEvent>) -> Result<(), InputError> {
    let _raw = RawModeGuard::enable()?;
    loop {
        let event = crossterm::event::read().map_err(InputError::Read)?;
        let at = Instant::now();
        let Event::Key(key) = event else {
            continue;
        };
        match translate_key(key, at) {
            Some(KeyInput::Event(ev)) => {
                if tx.blocking_send(ev).is_err() {
                    break;
                }
            }
            Some(KeyInput::Quit) => {
                tracing::info!("Input closed from terminal");
                break;
            }
            None => {}
        }
    }
    Ok(())
}
