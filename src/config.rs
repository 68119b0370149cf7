use std::path::PathBuf;
use std::time::Duration;

/// Frame written to the actuator to release the lock.
pub const UNLOCK_FRAME: &[u8] = b"$001";
/// Frame written to the actuator to re-engage the lock.
pub const LOCK_FRAME: &[u8] = b"$000";
pub const PROMPT_TIMEOUT_SECS: u16 = 30;
/// Serial write timeout for the relay controller.
pub const SERIAL_TIMEOUT_SECS: u64 = 1;
pub const COMMAND_CHANNEL_SIZE: usize = 64;

pub const KEY_FILE: &str = "key.key";
pub const MASTER_FILE: &str = "master.dat";
pub const USER_FILE: &str = "users.dat";
pub const ACCESS_LOG_FILE: &str = "access.log";
pub const LOCK_FILE: &str = "cardgate.lock";

#[derive(clap::Parser, Debug, Clone)]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Directory holding the key, master and user files (defaults to the XDG data dir).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Serial card reader device; reads the terminal (or piped stdin) when omitted.
    #[arg(long)]
    pub reader: Option<PathBuf>,
    /// Line speed of `--reader` when it is a serial device.
    #[arg(long, default_value_t = 9600)]
    pub reader_baud_rate: u32,
    /// Serial port of the door relay controller.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub serial_port: PathBuf,
    #[arg(long, default_value_t = 9600)]
    pub baud_rate: u32,
    /// How long the door stays unlocked after a grant.
    #[arg(long, default_value_t = 1000)]
    pub hold_ms: u64,
    /// Bursts slower than this are treated as keyboard typing and dropped.
    #[arg(long, default_value_t = 2000)]
    pub scan_window_ms: u64,
    #[arg(long, default_value = "pinentry")]
    pub pinentry: String,
    /// Desktop notification command; empty disables notifications.
    #[arg(long, default_value = "notify-send")]
    pub notify_cmd: String,
    /// Print enrolled users and exit.
    #[arg(long)]
    pub list_users: bool,
}

impl Config {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        Ok(directories::ProjectDirs::from("", "", "cardgate")
            .ok_or_else(|| anyhow::anyhow!("cannot determine XDG data dir"))?
            .data_dir()
            .to_path_buf())
    }
}
