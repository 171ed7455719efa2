//! JSON file secret storage.
//!
//! Used on targets without a usable OS keyring. Values are kept in a single
//! flat JSON object on disk and mirrored in memory. On unix the file is
//! created with mode `0600`.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Secret, SecretStore, StoreError};

/// File-backed secret store.
pub struct FileStore {
    path: PathBuf,
    data: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. A file that exists but does not
    /// parse is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Called with the write lock held so concurrent writers cannot reorder.
    fn persist(&self, data: &HashMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(data)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            // mode() only applies on creation; tighten a file made elsewhere
            // before the tokens go in.
            if self.path.exists() {
                fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
            }
        }

        let mut file = options.open(&self.path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("keys_count", &self.data.read().len())
            .finish()
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.data.read().get(key).map(Secret::new))
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        let mut data = self.data.write();
        data.insert(key.to_string(), secret.expose().to_string());
        self.persist(&data)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.write();
        if data.remove(key).is_some() {
            self.persist(&data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join("nested/credentials.json")).unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_file_store_set_get() {
        let (store, _temp) = test_store();

        store.set("auth0_access_token", &Secret::new("abc123")).await.unwrap();
        let retrieved = store.get("auth0_access_token").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "abc123");
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let (store, _temp) = test_store();
        store.set("auth0_refresh_token", &Secret::new("r-1")).await.unwrap();

        let reopened = FileStore::open(store.path()).unwrap();
        let retrieved = reopened.get("auth0_refresh_token").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "r-1");
    }

    #[tokio::test]
    async fn test_file_store_delete() {
        let (store, _temp) = test_store();
        store.set("k", &Secret::new("v")).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();

        let reopened = FileStore::open(store.path()).unwrap();
        assert!(reopened.get("k").await.unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        fs::write(&path, "{not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StoreError::SerializationError(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _temp) = test_store();
        store.set("k", &Secret::new("v")).await.unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::open(&path).unwrap();
        store
            .set("auth0_access_token", &Secret::new("abc123"))
            .await
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_new_file_is_created_private() {
        use std::os::unix::fs::PermissionsExt;

        // Fresh path: the file does not exist until the first write
        let (store, _temp) = test_store();
        assert!(!store.path().exists());
        store
            .set("auth0_access_token", &Secret::new("abc123"))
            .await
            .unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "group/other bits set: {:o}", mode);
    }
}
