pub mod credential;
pub(crate) mod disk;
pub mod index;

pub use credential::{CardHash, UserCredential, hash_identifier};
pub use index::CredentialStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] std::io::Error),
    #[error("Encrypt: {0}")]
    Encryption(String),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Corrupt store: {0}")]
    CorruptStore(String),
    #[error("Corrupt record at index {0}")]
    CorruptRecord(usize),
}
