use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    Command, Engine, Mode, Outcome,
    console::{HELP, OperatorLine, parse_operator_line, user_lines},
};
use crate::input::InputEvent;
use crate::scanner::{ScanBuffer, Submission};

/// Drive the engine from reader input until the input channel closes.
/// Blocking: run on a dedicated thread.
pub fn run_engine_loop(
    mut incoming_rx: mpsc::Receiver<InputEvent>,
    engine: &mut Engine,
    scan_window: Duration,
) {
    let mut buffer = ScanBuffer::new(scan_window);
    print_status(idle_status(engine.mode()));
    tracing::info!("Engine loop running");

    while let Some(event) = incoming_rx.blocking_recv() {
        match event {
            InputEvent::Key { ch, at } => buffer.push(ch, at),
            InputEvent::Enter { at } => match buffer.submit(at) {
                Submission::Card(card) => execute(engine, Command::Scan(card)),
                Submission::Operator(line) => operator(engine, &line),
                Submission::Discarded { elapsed } => {
                    tracing::debug!(?elapsed, "Discarded slow input burst");
                }
                Submission::Empty => {}
            },
        }
    }
    tracing::info!("Engine loop exiting (input closed)");
}

fn execute(engine: &mut Engine, cmd: Command) {
    match engine.handle(cmd) {
        Ok(outcome) => report(&outcome),
        Err(e) => {
            tracing::error!(mode = ?engine.mode(), "Store error: {e}");
            print_status(&format!("Error: {e}"));
        }
    }
}

fn operator(engine: &mut Engine, line: &str) {
    match parse_operator_line(line) {
        OperatorLine::Command(cmd) => execute(engine, cmd),
        OperatorLine::ListUsers => list_users(engine),
        OperatorLine::Status => {
            let count = engine
                .store()
                .user_count()
                .map(|n| n.to_string())
                .unwrap_or_else(|e| format!("unknown ({e})"));
            print_status(&format!("Mode: {:?}, enrolled users: {count}", engine.mode()));
        }
        OperatorLine::Help => print_status(HELP),
        OperatorLine::Invalid(msg) => print_status(&msg),
    }
}

fn list_users(engine: &Engine) {
    match user_lines(engine.store()) {
        Ok(lines) if lines.is_empty() => print_status("No users enrolled"),
        Ok(lines) => lines.iter().for_each(|line| print_status(line)),
        Err(e) => {
            tracing::error!("Cannot list users: {e}");
            print_status(&format!("Error: {e}"));
        }
    }
}

fn report(outcome: &Outcome) {
    if outcome.is_denial() {
        tracing::warn!(?outcome, "Denied");
    } else {
        tracing::debug!(?outcome, "Handled");
    }
    print_status(&outcome.to_string());
}

fn idle_status(mode: Mode) -> &'static str {
    match mode {
        Mode::Bootstrap => "Scan MASTER card",
        _ => "Ready: Scan card",
    }
}

// The terminal may be in raw mode, so end lines with an explicit CR.
fn print_status(msg: &str) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{msg}\r\n");
    let _ = out.flush();
}
