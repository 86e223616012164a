//! Bearer token persistence.
//!
//! The token outlives the process: [`FileTokenStore`] keeps it in a small
//! JSON file and mirrors it in memory so every request can read it without
//! touching the disk. [`MemoryTokenStore`] is the non-persistent variant.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors that can occur when persisting a token.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Reading or writing the token file failed.
    #[error("token file I/O error: {0}")]
    Io(#[from] io::Error),

    /// The token file is not valid JSON.
    #[error("token file is corrupt: {0}")]
    Format(#[from] serde_json::Error),

    /// A lock guarding the cached token was poisoned.
    #[error("token store lock poisoned")]
    Poisoned,
}

/// Storage for the session's bearer token.
///
/// Reads are synchronous and cheap; the API client consults the store on
/// every request.
pub trait TokenStore: Send + Sync {
    /// The current token, if any.
    fn token(&self) -> Option<SecretString>;

    /// Replace the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written.
    fn persist(&self, token: SecretString) -> Result<(), TokenStoreError>;

    /// Remove the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored token cannot be removed.
    fn clear(&self) -> Result<(), TokenStoreError>;

    /// Whether a token is present.
    fn has_token(&self) -> bool {
        self.token().is_some()
    }
}

// =============================================================================
// MemoryTokenStore
// =============================================================================

/// Token store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<SecretString>>,
}

impl MemoryTokenStore {
    /// A store pre-seeded with a token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(SecretString::from(token.into()))),
        }
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore")
            .field("has_token", &self.has_token())
            .finish()
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<SecretString> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn persist(&self, token: SecretString) -> Result<(), TokenStoreError> {
        *self.token.write().map_err(|_| TokenStoreError::Poisoned)? = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.write().map_err(|_| TokenStoreError::Poisoned)? = None;
        Ok(())
    }
}

// =============================================================================
// FileTokenStore
// =============================================================================

/// On-disk format of the token file.
#[derive(Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    saved_at: DateTime<Utc>,
}

/// Token store backed by a JSON file, with an in-memory copy.
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .field("has_token", &self.has_token())
            .finish()
    }
}

impl FileTokenStore {
    /// Open the store, loading a previously saved token if one exists.
    ///
    /// A corrupt file is treated as "no token" and removed, the same as a
    /// stale token would be.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let path = path.as_ref().to_path_buf();

        let cached = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<StoredToken>(&contents) {
                Ok(stored) => {
                    debug!(saved_at = %stored.saved_at, "Loaded saved token");
                    Some(SecretString::from(stored.access_token))
                }
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable token file");
                    fs::remove_file(&path)?;
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    /// Location of the token file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, token: &SecretString) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredToken {
            access_token: token.expose_secret().to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_vec_pretty(&stored)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // `mode` only applies on creation; tighten a file left by an older run.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(&contents)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<SecretString> {
        self.cached.read().ok().and_then(|guard| guard.clone())
    }

    fn persist(&self, token: SecretString) -> Result<(), TokenStoreError> {
        self.write_file(&token)?;
        *self.cached.write().map_err(|_| TokenStoreError::Poisoned)? = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.cached.write().map_err(|_| TokenStoreError::Poisoned)? = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::default();
        assert!(!store.has_token());

        store.persist(SecretString::from("abc")).unwrap();
        assert_eq!(store.token().unwrap().expose_secret(), "abc");

        store.clear().unwrap();
        assert!(store.token().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        assert!(!store.has_token());
        store.persist(SecretString::from("token-7")).unwrap();

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.token().unwrap().expose_secret(), "token-7");
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.persist(SecretString::from("token-7")).unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.token().is_none());

        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("fresh.json");
        let store = FileTokenStore::open(&fresh).unwrap();
        store.persist(SecretString::from("token-7")).unwrap();
        let mode = fs::metadata(&fresh).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let loose = dir.path().join("loose.json");
        fs::write(&loose, r#"{"access_token":"old","saved_at":"2024-01-01T00:00:00Z"}"#).unwrap();
        fs::set_permissions(&loose, fs::Permissions::from_mode(0o644)).unwrap();
        let store = FileTokenStore::open(&loose).unwrap();
        assert_eq!(store.token().unwrap().expose_secret(), "old");
        store.persist(SecretString::from("token-8")).unwrap();
        let mode = fs::metadata(&loose).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = FileTokenStore::open(&path).unwrap();
        assert!(store.token().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let store = MemoryTokenStore::with_token("super-secret");
        assert!(!format!("{store:?}").contains("super-secret"));
    }
}
