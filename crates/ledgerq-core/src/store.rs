//! Credential store: enrolled identities keyed by username

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ledgerq_crypto::sha256_concat;
use ledgerq_primitives::H256;
use ledgerq_sdk::Certificate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CoreError, CoreResult};

/// Persisted form of an enrolled identity
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Enrollment id
    pub username: String,
    /// Enrollment certificate
    pub certificate: Certificate,
    /// Hex-encoded private key
    pub private_key: String,
    /// Salted digest of the secret the credential was enrolled with
    #[serde(default)]
    pub secret: Option<SecretDigest>,
}

/// Salted SHA-256 of an enrollment secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDigest {
    salt: H256,
    digest: H256,
}

impl SecretDigest {
    /// Digest `secret` under a fresh random salt
    pub fn new(secret: &str) -> Self {
        let salt = H256::from_bytes(rand::random());
        Self {
            salt,
            digest: Self::hash(&salt, secret),
        }
    }

    /// Whether `secret` is the secret this digest was made from
    pub fn matches(&self, secret: &str) -> bool {
        Self::hash(&self.salt, secret) == self.digest
    }

    fn hash(salt: &H256, secret: &str) -> H256 {
        sha256_concat(&[salt.as_bytes(), secret.as_bytes()])
    }
}

impl Drop for StoredCredential {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("username", &self.username)
            .field("issuer", &self.certificate.issuer)
            .finish_non_exhaustive()
    }
}

/// Storage for enrolled credentials
pub trait CredentialStore: Send + Sync {
    /// Credential stored for `username`, if any
    fn load(&self, username: &str) -> CoreResult<Option<StoredCredential>>;

    /// Store a credential, replacing any previous one for the same username
    fn save(&self, credential: &StoredCredential) -> CoreResult<()>;

    /// Remove a credential; returns whether one existed
    fn remove(&self, username: &str) -> CoreResult<bool>;
}

/// In-memory store, lost at process exit
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, StoredCredential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, username: &str) -> CoreResult<Option<StoredCredential>> {
        Ok(self.entries.lock().get(username).cloned())
    }

    fn save(&self, credential: &StoredCredential) -> CoreResult<()> {
        self.entries
            .lock()
            .insert(credential.username.clone(), credential.clone());
        Ok(())
    }

    fn remove(&self, username: &str) -> CoreResult<bool> {
        Ok(self.entries.lock().remove(username).is_some())
    }
}

/// One JSON file per username under a directory
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, username: &str) -> CoreResult<PathBuf> {
        let valid = !username.is_empty()
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
            && !username.starts_with('.');
        if !valid {
            return Err(CoreError::Store(format!(
                "username {:?} cannot be used as a file name",
                username
            )));
        }
        Ok(self.dir.join(format!("{}.json", username)))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, username: &str) -> CoreResult<Option<StoredCredential>> {
        let path = self.path_for(username)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Store(format!("{}: {}", path.display(), e)))?;
        let credential = serde_json::from_str(&content)
            .map_err(|e| CoreError::Store(format!("{}: {}", path.display(), e)))?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &StoredCredential) -> CoreResult<()> {
        let path = self.path_for(&credential.username)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CoreError::Store(format!("{}: {}", self.dir.display(), e)))?;
        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| CoreError::Store(e.to_string()))?;
        std::fs::write(&path, content)
            .map_err(|e| CoreError::Store(format!("{}: {}", path.display(), e)))
    }

    fn remove(&self, username: &str) -> CoreResult<bool> {
        let path = self.path_for(username)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::Store(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(username: &str) -> StoredCredential {
        StoredCredential {
            username: username.to_string(),
            certificate: Certificate {
                subject: username.to_string(),
                public_key: "02".repeat(33),
                issuer: "ca.test".to_string(),
                serial: 1,
            },
            private_key: "11".repeat(32),
            secret: Some(SecretDigest::new("testpw")),
        }
    }

    #[test]
    fn test_secret_digest() {
        let digest = SecretDigest::new("testpw");
        assert!(digest.matches("testpw"));
        assert!(!digest.matches("testpw "));
        assert!(!digest.matches(""));
        assert_ne!(digest, SecretDigest::new("testpw"));
    }

    #[test]
    fn test_credential_without_secret_digest_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let mut legacy = serde_json::to_value(credential("test")).unwrap();
        legacy.as_object_mut().unwrap().remove("secret");
        std::fs::write(dir.path().join("test.json"), legacy.to_string()).unwrap();

        let loaded = store.load("test").unwrap().unwrap();
        assert!(loaded.secret.is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        assert!(store.load("test").unwrap().is_none());
        store.save(&credential("test")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("test").unwrap().unwrap().username, "test");
        assert!(store.remove("test").unwrap());
        assert!(!store.remove("test").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds"));

        store.save(&credential("test")).unwrap();
        assert!(dir.path().join("creds/test.json").exists());

        let loaded = store.load("test").unwrap().unwrap();
        assert_eq!(loaded.certificate.issuer, "ca.test");
        assert_eq!(loaded.private_key, "11".repeat(32));
        assert!(loaded.secret.as_ref().unwrap().matches("testpw"));

        assert!(store.remove("test").unwrap());
        assert!(store.load("test").unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(matches!(store.load("../etc"), Err(CoreError::Store(_))));
        assert!(matches!(store.load(""), Err(CoreError::Store(_))));
        assert!(matches!(store.load("a/b"), Err(CoreError::Store(_))));
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.json"), "not json").unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(matches!(store.load("test"), Err(CoreError::Store(_))));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let debug = format!("{:?}", credential("test"));
        assert!(!debug.contains(&"11".repeat(32)));
    }
}
