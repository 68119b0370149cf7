use std::fmt;
use std::time::{Duration, Instant};

/// Prefix marking an operator console line instead of a card scan.
pub const OPERATOR_PREFIX: char = '/';

/// Canonical card identifier: trimmed, upper-cased, non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct CardId(String);

impl CardId {
    pub fn parse(raw: &str) -> Option<Self> {
        let id = raw.trim().to_uppercase();
        if id.is_empty() { None } else { Some(Self(id)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Card numbers are credentials; keep them out of debug output.
impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId(<{} chars>)", self.0.len())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Submission {
    Card(CardId),
    Operator(String),
    Discarded { elapsed: Duration },
    Empty,
}

/// Accumulates reader characters between submits and applies the burst
/// timing check.
pub struct ScanBuffer {
    buf: String,
    started: Option<Instant>,
    window: Duration,
}

impl ScanBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            buf: String::new(),
            started: None,
            window,
        }
    }

    pub fn push(&mut self, ch: char, at: Instant) {
        if self.buf.is_empty() {
            self.started = Some(at);
        }
        self.buf.push(ch);
    }

    pub fn submit(&mut self, at: Instant) -> Submission {
        let raw = std::mem::take(&mut self.buf);
        let started = self.started.take();

        let line = raw.trim();
        if line.starts_with(OPERATOR_PREFIX) {
            return Submission::Operator(line.to_string());
        }

        let Some(started) = started else {
            return Submission::Empty;
        };
        let elapsed = at.saturating_duration_since(started);
        if elapsed > self.window {
            return Submission::Discarded { elapsed };
        }
        match CardId::parse(&raw) {
            Some(id) => Submission::Card(id),
            None => Submission::Empty,
        }
    }
}
