pub(crate) mod dialog;
pub(crate) mod text;

pub use dialog::PinentryPrompt;

/// Asks the operator for an optional display name during enrollment.
/// Blocks the caller until answered; `None` means "no name given".
pub trait NamePrompt: Send {
    fn ask_optional_name(&self) -> Option<String>;
}
