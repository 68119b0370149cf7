pub mod console;
pub mod dispatch;
pub mod types;

pub use dispatch::run_engine_loop;
pub use types::{Command, Mode, Outcome};

use crate::actuator::Actuator;
use crate::audit::EventLog;
use crate::notify::{NOTIFY_TITLE, Notifier};
use crate::prompt::NamePrompt;
use crate::scanner::CardId;
use crate::store::{CredentialStore, StoreError, hash_identifier};

/// Everything the engine talks to outside the credential store.
pub struct Collaborators {
    pub actuator: Box<dyn Actuator>,
    pub notifier: Box<dyn Notifier>,
    pub log: Box<dyn EventLog>,
    pub prompt: Box<dyn NamePrompt>,
}

/// Card-scan state machine. Owns the store; processes one command at a time.
pub struct Engine {
    store: CredentialStore,
    mode: Mode,
    io: Collaborators,
}

impl Engine {
    /// Start in `Bootstrap` when no master is enrolled, `Normal` otherwise.
    pub fn new(store: CredentialStore, io: Collaborators) -> Result<Self, StoreError> {
        let mode = if store.has_master()? {
            Mode::Normal
        } else {
            Mode::Bootstrap
        };
        tracing::info!(?mode, "Authorization engine ready");
        Ok(Self { store, mode, io })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Apply one command. Store failures are returned; the mode is already
    /// back to `Normal` for any side protocol that was in progress.
    pub fn handle(&mut self, cmd: Command) -> Result<Outcome, StoreError> {
        match cmd {
            Command::Scan(card) => self.scan(&card),
            Command::EnableAdd => Ok(self.arm(Mode::AdminAuthorizing)),
            Command::RequestDelete(index) => Ok(self.arm(Mode::DeleteConfirm {
                pending_index: index,
            })),
            Command::Cancel => Ok(self.cancel()),
        }
    }

    fn arm(&mut self, next: Mode) -> Outcome {
        match self.mode {
            Mode::Normal => {}
            Mode::Bootstrap => {
                return Outcome::Rejected {
                    reason: "scan the master card first",
                };
            }
            _ => {
                return Outcome::Rejected {
                    reason: "another operation is waiting for the master card",
                };
            }
        }
        self.mode = next;
        tracing::debug!(mode = ?self.mode, "Side protocol armed");
        match next {
            Mode::DeleteConfirm { pending_index } => Outcome::DeleteArmed {
                index: pending_index,
            },
            _ => Outcome::AddArmed,
        }
    }

    fn cancel(&mut self) -> Outcome {
        match self.mode {
            Mode::Bootstrap | Mode::Normal => Outcome::Rejected {
                reason: "nothing to cancel",
            },
            _ => {
                self.mode = Mode::Normal;
                Outcome::Cancelled
            }
        }
    }

    fn scan(&mut self, card: &CardId) -> Result<Outcome, StoreError> {
        let raw = card.as_str();
        match self.mode {
            Mode::Bootstrap => {
                self.store.save_master(raw)?;
                self.mode = Mode::Normal;
                self.io.log.log_event("Master created");
                Ok(Outcome::MasterCreated)
            }
            Mode::DeleteConfirm { pending_index } => {
                self.mode = Mode::Normal;
                if self.store.verify_master(raw)? {
                    if self.store.delete_user(pending_index)? {
                        self.io
                            .log
                            .log_event(&format!("User {} deleted by MASTER", pending_index + 1));
                        Ok(Outcome::UserDeleted {
                            index: pending_index,
                        })
                    } else {
                        self.io.log.log_event(&format!(
                            "Deletion skipped: no user {}",
                            pending_index + 1
                        ));
                        Ok(Outcome::NothingToDelete {
                            index: pending_index,
                        })
                    }
                } else {
                    self.io.log.log_event("Deletion denied");
                    self.io.notifier.notify(NOTIFY_TITLE, "Deletion denied");
                    Ok(Outcome::DeletionDenied)
                }
            }
            Mode::AdminAuthorizing => {
                self.mode = Mode::Normal;
                if self.store.verify_master(raw)? {
                    self.mode = Mode::AdminAwaitingNewUser;
                    self.io.log.log_event("Master authorized admin mode");
                    Ok(Outcome::AdminAuthorized)
                } else {
                    self.io.log.log_event("Admin denied");
                    self.io.notifier.notify(NOTIFY_TITLE, "Admin denied");
                    Ok(Outcome::AdminDenied)
                }
            }
            Mode::AdminAwaitingNewUser => {
                self.mode = Mode::Normal;
                let name = self.io.prompt.ask_optional_name();
                let name = self.store.add_user(raw, name.as_deref())?;
                self.io.log.log_event(&format!("User added: {name}"));
                Ok(Outcome::UserAdded { name })
            }
            Mode::Normal => self.check_access(raw),
        }
    }

    fn check_access(&mut self, raw: &str) -> Result<Outcome, StoreError> {
        if self.store.verify_master(raw)? {
            let name = "Master".to_string();
            self.io
                .log
                .log_event(&format!("Access granted (MASTER): {name}"));
            self.io.actuator.trigger_open();
            self.io
                .notifier
                .notify(NOTIFY_TITLE, &format!("Master opened door: {name}"));
            return Ok(Outcome::Granted { name, master: true });
        }

        if self.store.verify_user(raw)? {
            // Access hinges on the hash alone; an unreadable name is cosmetic.
            let name = match self.store.get_display_name(raw) {
                Ok(Some(name)) => name,
                Ok(None) => "Unknown".to_string(),
                Err(e) => {
                    tracing::warn!("Cannot read display name: {e}");
                    "(unreadable name)".to_string()
                }
            };
            self.io.log.log_event(&format!("Access granted: {name}"));
            self.io.actuator.trigger_open();
            self.io
                .notifier
                .notify(NOTIFY_TITLE, &format!("Access granted: {name}"));
            return Ok(Outcome::Granted {
                name,
                master: false,
            });
        }

        let card = hash_identifier(raw).fingerprint();
        self.io
            .log
            .log_event(&format!("Access denied: unknown card {card}"));
        self.io
            .notifier
            .notify(NOTIFY_TITLE, "Access denied: Unknown");
        Ok(Outcome::Denied)
    }
}
