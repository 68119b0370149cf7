use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

pub const HASH_LEN: usize = 32;

/// SHA-256 digest of a card identifier. The identifier itself is never stored.
#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
pub struct CardHash([u8; HASH_LEN]);

impl CardHash {
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Short prefix safe to put in logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl PartialEq for CardHash {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Debug for CardHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardHash({}..)", self.fingerprint())
    }
}

pub fn hash_identifier(raw: &str) -> CardHash {
    CardHash(Sha256::digest(raw.as_bytes()).into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub id_hash: CardHash,
    /// `nonce || ciphertext` of the UTF-8 display name, sealed on its own.
    pub display_name: Vec<u8>,
}
