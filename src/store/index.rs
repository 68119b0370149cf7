use std::path::{Path, PathBuf};

use super::{
    StoreError,
    credential::{CardHash, HASH_LEN, UserCredential, hash_identifier},
    disk,
};
use crate::config::{MASTER_FILE, USER_FILE};
use crate::keystore::SecretKey;

/// Encrypted master slot plus the ordered list of enrolled users.
///
/// Every mutation decrypts the whole user blob, edits it in memory and writes it
/// back atomically. Nothing is cached between calls, so the files on disk are
/// always the source of truth.
pub struct CredentialStore {
    key: SecretKey,
    master_path: PathBuf,
    users_path: PathBuf,
}

impl CredentialStore {
    /// Open the store in `data_dir`, creating the empty master slot and an
    /// encrypted empty user list if they do not exist yet.
    pub fn open(key: SecretKey, data_dir: &Path) -> Result<Self, StoreError> {
        let store = Self {
            key,
            master_path: data_dir.join(MASTER_FILE),
            users_path: data_dir.join(USER_FILE),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StoreError> {
        if !self.users_path.exists() {
            self.save_users(&[])?;
            tracing::debug!(path = %self.users_path.display(), "Initialized empty user store");
        }
        if !self.master_path.exists() {
            disk::write_atomic(&self.master_path, &[])?;
        }
        Ok(())
    }

    /// Overwrite the master slot with the sealed hash of `raw`.
    pub fn save_master(&self, raw: &str) -> Result<(), StoreError> {
        let hash = hash_identifier(raw);
        let sealed = disk::seal(&self.key, hash.as_bytes())?;
        disk::write_atomic(&self.master_path, &sealed)
    }

    /// A missing slot means no master; any other I/O error is reported.
    pub fn has_master(&self) -> Result<bool, StoreError> {
        match std::fs::metadata(&self.master_path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::StorageFailure(e)),
        }
    }

    pub fn verify_master(&self, raw: &str) -> Result<bool, StoreError> {
        let sealed = match disk::read_optional(&self.master_path)? {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(false),
        };
        let plaintext = disk::open(&self.key, &sealed)
            .map_err(|e| StoreError::CorruptStore(format!("master slot: {e}")))?;
        let stored: [u8; HASH_LEN] = plaintext.as_slice().try_into().map_err(|_| {
            StoreError::CorruptStore(format!(
                "master slot holds {} bytes, expected {HASH_LEN}",
                plaintext.len()
            ))
        })?;
        Ok(CardHash::from_bytes(stored) == hash_identifier(raw))
    }

    pub fn load_users(&self) -> Result<Vec<UserCredential>, StoreError> {
        let sealed = match disk::read_optional(&self.users_path)? {
            Some(bytes) => bytes,
            None => return Ok(Vec::new()),
        };
        let plaintext = disk::open(&self.key, &sealed)
            .map_err(|e| StoreError::CorruptStore(format!("user store: {e}")))?;
        ciborium::from_reader(plaintext.as_slice())
            .map_err(|e| StoreError::CorruptStore(format!("user store: {e}")))
    }

    pub fn save_users(&self, users: &[UserCredential]) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        encode_users(users, &mut buf)?;
        let sealed = disk::seal(&self.key, &buf)?;
        disk::write_atomic(&self.users_path, &sealed)
    }

    /// Enroll `raw`. A missing or blank name becomes `User {n+1}`.
    /// Returns the name actually stored.
    pub fn add_user(&self, raw: &str, display_name: Option<&str>) -> Result<String, StoreError> {
        let mut users = self.load_users()?;
        let id_hash = hash_identifier(raw);
        if users.iter().any(|u| u.id_hash == id_hash) {
            tracing::warn!(card = %id_hash.fingerprint(), "Card is already enrolled; adding duplicate entry");
        }
        let name = match display_name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("User {}", users.len() + 1),
        };
        let sealed_name = disk::seal(&self.key, name.as_bytes())?;
        users.push(UserCredential {
            id_hash,
            display_name: sealed_name,
        });
        self.save_users(&users)?;
        Ok(name)
    }

    /// Remove the user at `index`. Returns `false` without touching disk when
    /// the index is out of range.
    pub fn delete_user(&self, index: usize) -> Result<bool, StoreError> {
        let mut users = self.load_users()?;
        if index >= users.len() {
            return Ok(false);
        }
        users.remove(index);
        self.save_users(&users)?;
        Ok(true)
    }

    pub fn verify_user(&self, raw: &str) -> Result<bool, StoreError> {
        let hash = hash_identifier(raw);
        Ok(self.load_users()?.iter().any(|u| u.id_hash == hash))
    }

    pub fn get_display_name(&self, raw: &str) -> Result<Option<String>, StoreError> {
        let hash = hash_identifier(raw);
        let users = self.load_users()?;
        match users.iter().position(|u| u.id_hash == hash) {
            Some(index) => self.decrypt_name(index, &users[index]).map(Some),
            None => Ok(None),
        }
    }

    /// Decrypt every display name in store order. A record whose name cannot
    /// be decrypted is reported in place rather than replaced with a default.
    pub fn display_names(&self) -> Result<Vec<Result<String, StoreError>>, StoreError> {
        let users = self.load_users()?;
        Ok(users
            .iter()
            .enumerate()
            .map(|(index, user)| self.decrypt_name(index, user))
            .collect())
    }

    pub fn user_count(&self) -> Result<usize, StoreError> {
        Ok(self.load_users()?.len())
    }

    fn decrypt_name(&self, index: usize, user: &UserCredential) -> Result<String, StoreError> {
        let plaintext =
            disk::open(&self.key, &user.display_name).map_err(|_| StoreError::CorruptRecord(index))?;
        String::from_utf8(plaintext).map_err(|_| StoreError::CorruptRecord(index))
    }
}

fn encode_users<W: std::io::Write>(
    users: &[UserCredential],
    writer: W,
) -> Result<(), StoreError> {
    ciborium::into_writer(users, writer).map_err(|e| StoreError::Serialization(e.to_string()))
}
