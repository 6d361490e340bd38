//! Process-wide user settings stored as a JSON document under the home
//! directory.
//!
//! The settings file is `~/.appforge/appforge.json`: a flat JSON object with
//! no enforced schema. A missing or unreadable file reads as an empty object
//! so first runs never fail; the containing directory is created on first
//! write.

use crate::error::{ProvisionError, Result};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SETTINGS_DIR_NAME: &str = ".appforge";
const SETTINGS_FILE_NAME: &str = "appforge.json";

#[cfg(windows)]
const HOME_VAR: &str = "USERPROFILE";
#[cfg(not(windows))]
const HOME_VAR: &str = "HOME";

/// A flat JSON object, keyed by arbitrary caller-chosen strings.
pub type SettingsMap = Map<String, Value>;

/// Resolve the home directory from the environment.
///
/// Reads the environment variable directly rather than falling back to
/// platform lookups: an unset variable is a configuration error, surfaced
/// before any filesystem access happens.
fn home_dir() -> Result<PathBuf> {
    match std::env::var_os(HOME_VAR) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => Err(ProvisionError::MissingHome(HOME_VAR)),
    }
}

/// The per-user settings directory, `~/.appforge`.
pub fn settings_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(SETTINGS_DIR_NAME))
}

/// Full path of the settings file, `~/.appforge/appforge.json`.
pub fn settings_path() -> Result<PathBuf> {
    Ok(settings_dir()?.join(SETTINGS_FILE_NAME))
}

/// Open a handle to the user settings document.
///
/// Resolves the path from the environment; nothing is read until the first
/// accessor call, and the common missing-file case is not an error.
pub fn open() -> Result<SettingsDocument> {
    Ok(SettingsDocument {
        path: settings_path()?,
    })
}

/// Handle bound to the resolved settings path.
///
/// Every accessor re-reads the file; the handle caches only the path, so
/// concurrent edits from other tools are picked up on the next call.
#[derive(Debug, Clone)]
pub struct SettingsDocument {
    path: PathBuf,
}

impl SettingsDocument {
    /// Bind a document handle to an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document.
    ///
    /// A missing, unreadable, or unparsable file yields an empty object.
    pub async fn read(&self) -> SettingsMap {
        let Ok(bytes) = tokio::fs::read(&self.path).await else {
            return SettingsMap::new();
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            _ => SettingsMap::new(),
        }
    }

    /// Look up a single key.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.read().await.get(key).cloned()
    }

    /// Set a single key and persist the document.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.read().await;
        map.insert(key.to_string(), value);
        self.write(&map).await
    }

    /// Remove a key, returning its previous value if any.
    pub async fn remove(&self, key: &str) -> Result<Option<Value>> {
        let mut map = self.read().await;
        let previous = map.remove(key);
        if previous.is_some() {
            self.write(&map).await?;
        }
        Ok(previous)
    }

    /// Persist the full document, creating the settings directory as needed.
    pub async fn write(&self, map: &SettingsMap) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| ProvisionError::MissingHome(HOME_VAR))?
            .to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let dir_perms = std::fs::Permissions::from_mode(0o700);
            tokio::fs::set_permissions(&dir, dir_perms).await?;
        }

        let content = serde_json::to_vec_pretty(&Value::Object(map.clone()))?;

        // Atomic write using temp file + rename
        let mut temp_file = NamedTempFile::new_in(&dir)?;
        temp_file.write_all(&content)?;
        temp_file.flush()?;
        temp_file
            .persist(&self.path)
            .map_err(|e| ProvisionError::Io(e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let file_perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, file_perms).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_joins_dir_and_file() {
        let doc = SettingsDocument::at(
            Path::new("/home/someone")
                .join(SETTINGS_DIR_NAME)
                .join(SETTINGS_FILE_NAME),
        );
        assert_eq!(
            doc.path(),
            Path::new("/home/someone/.appforge/appforge.json")
        );
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = SettingsDocument::at(dir.path().join("appforge.json"));
        assert!(doc.read().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("appforge.json");
        tokio::fs::write(&path, b"{ this is not json")
            .await
            .expect("write corrupt file");
        let doc = SettingsDocument::at(path);
        assert!(doc.read().await.is_empty());
    }

    #[tokio::test]
    async fn set_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = SettingsDocument::at(dir.path().join("nested").join("appforge.json"));
        doc.set("k", Value::String("v".to_string()))
            .await
            .expect("set");

        let map = doc.read().await;
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k"), Some(&Value::String("v".to_string())));
    }

    #[tokio::test]
    async fn remove_deletes_key_and_returns_previous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = SettingsDocument::at(dir.path().join("appforge.json"));
        doc.set("teamId", Value::String("T1".to_string()))
            .await
            .expect("set");

        let previous = doc.remove("teamId").await.expect("remove");
        assert_eq!(previous, Some(Value::String("T1".to_string())));
        assert!(doc.read().await.is_empty());

        // Removing an absent key is a no-op
        assert_eq!(doc.remove("teamId").await.expect("remove"), None);
    }
}
