pub mod serial;

pub use serial::SerialActuator;

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("cannot open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Door lock driver. Fire-and-forget: implementations must return
/// immediately and keep their own failures to themselves.
pub trait Actuator: Send {
    fn trigger_open(&self);
}
