#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Keystore unavailable: {0}")]
    KeystoreUnavailable(#[from] crate::keystore::KeystoreError),
    #[error("Store: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
