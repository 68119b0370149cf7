use serialport::SerialPort;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Handle;

use super::{Actuator, ActuatorError};
use crate::config::{LOCK_FRAME, SERIAL_TIMEOUT_SECS, UNLOCK_FRAME};

/// Relay controller on a serial line.
pub struct SerialActuator {
    port: PathBuf,
    baud_rate: u32,
    hold: Duration,
    runtime: Handle,
}

impl SerialActuator {
    pub fn new(port: PathBuf, baud_rate: u32, hold: Duration, runtime: Handle) -> Self {
        Self {
            port,
            baud_rate,
            hold,
            runtime,
        }
    }
}

impl Actuator for SerialActuator {
    fn trigger_open(&self) {
        let port = self.port.clone();
        let baud_rate = self.baud_rate;
        let hold = self.hold;
        self.runtime.spawn_blocking(move || {
            let result = open_port(&port, baud_rate)
                .and_then(|mut dev| send_open_sequence(&mut dev, hold));
            match result {
                Ok(()) => tracing::debug!(port = %port.display(), "Door cycle complete"),
                Err(e) => tracing::error!("Actuator error: {e}"),
            }
        });
    }
}

/// Open the relay port at `baud_rate`, 8N1, with a short write timeout.
pub fn open_port(port: &Path, baud_rate: u32) -> Result<Box<dyn SerialPort>, ActuatorError> {
    let name = port.to_string_lossy().into_owned();
    serialport::new(name.as_str(), baud_rate)
        .timeout(Duration::from_secs(SERIAL_TIMEOUT_SECS))
        .open()
        .map_err(|source| ActuatorError::Open { port: name, source })
}

/// Unlock, hold for `hold`, then lock again. Blocking.
pub fn send_open_sequence<W: Write + ?Sized>(
    dev: &mut W,
    hold: Duration,
) -> Result<(), ActuatorError> {
    dev.write_all(UNLOCK_FRAME)?;
    dev.flush()?;
    tracing::trace!("Unlock frame sent");
    std::thread::sleep(hold);
    dev.write_all(LOCK_FRAME)?;
    dev.flush()?;
    tracing::trace!("Lock frame sent");
    Ok(())
}
