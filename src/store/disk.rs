use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use std::io::Write;
use std::path::Path;

use super::StoreError;
use crate::keystore::SecretKey;

pub(crate) const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under `key`, returning `nonce || ciphertext`.
pub(crate) fn seal(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Reverse of [`seal`]. Fails on truncation, wrong key or tampering.
pub(crate) fn open(key: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>, String> {
    if sealed.len() < NONCE_LEN {
        return Err("ciphertext too short".into());
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| e.to_string())?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| "authentication failed (wrong key or tampered data)".to_string())
}

/// Replace `path` with `bytes` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store");
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    let tmp_path = parent.join(format!(".{file_name}.{}.tmp", hex::encode(suffix)));

    if let Err(e) = write_and_rename(&tmp_path, path, bytes) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::StorageFailure(e));
    }
    Ok(())
}

fn write_and_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    std::fs::rename(tmp_path, path)
}

/// Read `path`, returning `None` when it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::StorageFailure(e)),
    }
}
