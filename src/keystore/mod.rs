use rand::RngCore;
use std::fmt;
use std::io::Write;
use std::path::Path;
use zeroize::Zeroize;

pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("cannot read key file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot create key file {path}: {source}")]
    Create {
        path: String,
        source: std::io::Error,
    },
    #[error("key file is malformed: expected 32 bytes, got {0}")]
    Malformed(usize),
}

/// Symmetric key protecting the credential store. Wiped on drop.
#[derive(Clone)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Load the key at `path`, generating and persisting a fresh one on first run.
///
/// An existing key is never replaced: a short or oversized file is an error,
/// because everything already sealed under the old key would become unreadable.
pub fn obtain_key(path: &Path) -> Result<SecretKey, KeystoreError> {
    if path.exists() {
        let mut blob = std::fs::read(path).map_err(|source| KeystoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if blob.len() != KEY_LEN {
            let len = blob.len();
            blob.zeroize();
            return Err(KeystoreError::Malformed(len));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&blob);
        blob.zeroize();
        tracing::debug!(path = %path.display(), "Loaded key material");
        Ok(SecretKey(bytes))
    } else {
        let key = SecretKey::generate();
        write_key_file(path, &key).map_err(|source| KeystoreError::Create {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Generated new key material");
        Ok(key)
    }
}

fn write_key_file(path: &Path, key: &SecretKey) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(key.as_bytes())?;
    file.sync_all()
}
