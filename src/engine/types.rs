use std::fmt;

use crate::scanner::CardId;

/// Protocol state between scans. Only one side protocol can be pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No master enrolled; the next card becomes the master.
    Bootstrap,
    Normal,
    /// Waiting for the master card to confirm removal of `pending_index`.
    DeleteConfirm { pending_index: usize },
    /// Waiting for the master card before enrollment may begin.
    AdminAuthorizing,
    /// Master accepted; the next card is enrolled.
    AdminAwaitingNewUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan(CardId),
    EnableAdd,
    RequestDelete(usize),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    MasterCreated,
    AddArmed,
    DeleteArmed { index: usize },
    Cancelled,
    Rejected { reason: &'static str },
    AdminAuthorized,
    AdminDenied,
    UserAdded { name: String },
    UserDeleted { index: usize },
    NothingToDelete { index: usize },
    DeletionDenied,
    Granted { name: String, master: bool },
    Denied,
}

impl Outcome {
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Outcome::AdminDenied | Outcome::DeletionDenied | Outcome::Denied | Outcome::Rejected { .. }
        )
    }
}

/// Operator-facing status line.
impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::MasterCreated => f.write_str("Master saved"),
            Outcome::AddArmed => f.write_str("Scan MASTER to authorize"),
            Outcome::DeleteArmed { .. } => f.write_str("Scan MASTER to confirm deletion"),
            Outcome::Cancelled => f.write_str("Cancelled"),
            Outcome::Rejected { reason } => write!(f, "Not now: {reason}"),
            Outcome::AdminAuthorized => f.write_str("Scan new user card"),
            Outcome::AdminDenied => f.write_str("Admin denied"),
            Outcome::UserAdded { name } => write!(f, "User added: {name}"),
            Outcome::UserDeleted { index } => write!(f, "User {} deleted", index + 1),
            Outcome::NothingToDelete { index } => write!(f, "No user {} to delete", index + 1),
            Outcome::DeletionDenied => f.write_str("Deletion denied"),
            Outcome::Granted { name, master: true } => write!(f, "Access granted (MASTER): {name}"),
            Outcome::Granted { name, master: false } => write!(f, "Access granted: {name}"),
            Outcome::Denied => f.write_str("Access denied"),
        }
    }
}
