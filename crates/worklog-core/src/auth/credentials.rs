//! On-disk storage of the signed-in token pair.
//!
//! The record is JSON, XOR-ed against a fixed embedded keystream and then
//! base64 encoded. This keeps the file from being human-readable but is
//! obfuscation only: the key ships in the binary and is the same on every
//! machine. An OS keychain would be the stronger alternative.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config;

use super::AuthError;

/// Credential file name in the config directory
const CREDENTIALS_FILE: &str = "credentials.dat";

/// Fixed, non-secret keystream for the at-rest transform.
const OBFUSCATION_KEY: &[u8] = b"worklog.desktop/credential-store/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCredentialRecord {
    pub id_token: String,
    pub refresh_token: String,
}

impl PersistedCredentialRecord {
    /// Only a complete pair is persistable.
    pub fn new(id_token: &str, refresh_token: &str) -> Option<Self> {
        if id_token.is_empty() || refresh_token.is_empty() {
            return None;
        }
        Some(Self {
            id_token: id_token.to_string(),
            refresh_token: refresh_token.to_string(),
        })
    }
}

fn xor_keystream(bytes: &mut [u8]) {
    for (byte, key) in bytes.iter_mut().zip(OBFUSCATION_KEY.iter().cycle()) {
        *byte ^= key;
    }
}

/// Serialize and obfuscate a record for storage.
pub fn encode(record: &PersistedCredentialRecord) -> serde_json::Result<String> {
    let mut bytes = serde_json::to_vec(record)?;
    xor_keystream(&mut bytes);
    Ok(STANDARD.encode(bytes))
}

/// Reverse [`encode`]. Fails on anything that is not a well-formed record.
pub fn decode(contents: &str) -> Result<PersistedCredentialRecord> {
    let mut bytes = STANDARD.decode(contents.trim())?;
    xor_keystream(&mut bytes);
    let record: PersistedCredentialRecord = serde_json::from_slice(&bytes)?;
    if record.id_token.is_empty() || record.refresh_token.is_empty() {
        anyhow::bail!("Credential record has an empty token");
    }
    Ok(record)
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.config/worklog/credentials.dat`
    pub fn default_path() -> Result<PathBuf> {
        Ok(config::config_dir()?.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored record. Missing, unreadable or corrupt files all
    /// read as "no session".
    pub fn load(&self) -> Option<PersistedCredentialRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credentials");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read credentials");
                return None;
            }
        };

        match decode(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt credential file");
                None
            }
        }
    }

    /// Write the record, replacing any previous file.
    ///
    /// The encoded record goes to a sibling temp file first and is renamed
    /// into place, so readers see either the old file or the new one.
    pub fn save(&self, record: &PersistedCredentialRecord) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = encode(record).map_err(io::Error::from)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    /// Delete the stored record. Succeeds if it is already gone.
    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(e)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("worklog").join(CREDENTIALS_FILE))
    }

    #[test]
    fn test_record_requires_both_tokens() {
        assert!(PersistedCredentialRecord::new("a", "r").is_some());
        assert!(PersistedCredentialRecord::new("", "r").is_none());
        assert!(PersistedCredentialRecord::new("a", "").is_none());
    }

    #[test]
    fn test_encoded_file_is_not_plain_json() {
        let record = PersistedCredentialRecord::new("idtok1", "reftok1").unwrap();
        let encoded = encode(&record).unwrap();
        assert!(!encoded.contains("idtok1"));
        assert!(!encoded.contains("refresh_token"));
        assert_eq!(decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_decoded_bytes_are_expected_json() {
        let record = PersistedCredentialRecord::new("idtok1", "reftok1").unwrap();
        let mut bytes = STANDARD.decode(encode(&record).unwrap()).unwrap();
        xor_keystream(&mut bytes);
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id_token": "idtok1", "refresh_token": "reftok1"})
        );
    }

    #[test]
    fn test_save_creates_parent_dirs_and_loads_back() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_none());

        let record = PersistedCredentialRecord::new("a1", "r1").unwrap();
        store.save(&record).unwrap();
        assert!(store.exists());
        assert!(!store.path().with_extension("tmp").exists());
        assert_eq!(store.load(), Some(record));

        let replacement = PersistedCredentialRecord::new("a2", "r1").unwrap();
        store.save(&replacement).unwrap();
        assert_eq!(store.load(), Some(replacement));
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        std::fs::write(store.path(), [0xff, 0x00, 0x13, 0x37]).unwrap();
        assert!(store.load().is_none());

        std::fs::write(store.path(), "aGVsbG8gd29ybGQ=").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&PersistedCredentialRecord::new("a", "r").unwrap())
            .unwrap();

        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_save_reports_storage_error() {
        let dir = TempDir::new().unwrap();
        // A regular file where the config directory should be.
        std::fs::write(dir.path().join("worklog"), b"").unwrap();
        let store = store_in(&dir);

        let err = store
            .save(&PersistedCredentialRecord::new("a", "r").unwrap())
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(store.load().is_none());
    }
}
