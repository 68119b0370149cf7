use tokio::runtime::Handle;

pub const NOTIFY_TITLE: &str = "Access Control";

/// Best-effort user-visible notification.
pub trait Notifier: Send {
    fn notify(&self, title: &str, message: &str);
}

/// Runs an external notification command (`notify-send` style: title then body).
pub struct DesktopNotifier {
    command: String,
    runtime: Handle,
}

impl DesktopNotifier {
    pub fn new(command: String, runtime: Handle) -> Self {
        Self { command, runtime }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, "{message}");
        let command = self.command.clone();
        let title = title.to_string();
        let message = message.to_string();
        self.runtime.spawn_blocking(move || {
            match std::process::Command::new(&command)
                .arg(&title)
                .arg(&message)
                .status()
            {
                Ok(status) if !status.success() => {
                    tracing::warn!(command = %command, %status, "Notification command failed")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(command = %command, "Cannot run notification command: {e}"),
            }
        });
    }
}

/// Notifier used when desktop notifications are disabled.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, "{message}");
    }
}
