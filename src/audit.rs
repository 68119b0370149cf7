use std::io::Write;
use std::path::PathBuf;

/// Append-only access log. Failures are logged and swallowed.
pub trait EventLog: Send {
    fn log_event(&self, message: &str);
}

pub struct FileEventLog {
    path: PathBuf,
}

impl FileEventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl EventLog for FileEventLog {
    fn log_event(&self, message: &str) {
        tracing::info!(target: "cardgate::audit", "{message}");
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Err(e) = self.append(&format!("{stamp} - {message}")) {
            tracing::warn!(path = %self.path.display(), "Cannot write access log: {e}");
        }
    }
}
