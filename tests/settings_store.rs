//! Integration tests for the user settings document, driven through the
//! real environment-based path resolution.

use appforge_provision::error::ProvisionError;
use appforge_provision::settings;
use serde_json::Value;
use std::sync::Mutex;

#[cfg(windows)]
const HOME_VAR: &str = "USERPROFILE";
#[cfg(not(windows))]
const HOME_VAR: &str = "HOME";

// Settings resolution reads the process environment, so tests that rewire
// the home variable must not interleave.
static ENV_LOCK: Mutex<()> = Mutex::new(());

struct HomeGuard {
    previous: Option<std::ffi::OsString>,
}

impl HomeGuard {
    fn set(value: Option<&std::path::Path>) -> Self {
        let previous = std::env::var_os(HOME_VAR);
        match value {
            Some(path) => std::env::set_var(HOME_VAR, path),
            None => std::env::remove_var(HOME_VAR),
        }
        Self { previous }
    }
}

impl Drop for HomeGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => std::env::set_var(HOME_VAR, value),
            None => std::env::remove_var(HOME_VAR),
        }
    }
}

#[test]
fn missing_home_is_a_configuration_error() {
    let _lock = ENV_LOCK.lock().expect("env lock");
    let _guard = HomeGuard::set(None);

    let err = settings::settings_path().expect_err("path resolution must fail");
    assert!(matches!(err, ProvisionError::MissingHome(_)));
    assert!(settings::open().is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn first_run_reads_as_empty_object() {
    let home = tempfile::tempdir().expect("tempdir");
    let doc = {
        let _lock = ENV_LOCK.lock().expect("env lock");
        let _guard = HomeGuard::set(Some(home.path()));
        settings::open().expect("open")
    };

    // Nothing exists yet under the fresh home
    assert!(doc.read().await.is_empty());
    assert_eq!(doc.get("anything").await, None);
}

#[tokio::test(flavor = "current_thread")]
async fn write_then_reopen_round_trips() {
    let home = tempfile::tempdir().expect("tempdir");
    let (doc, expected_path) = {
        let _lock = ENV_LOCK.lock().expect("env lock");
        let _guard = HomeGuard::set(Some(home.path()));
        (
            settings::open().expect("open"),
            settings::settings_path().expect("path"),
        )
    };

    doc.set("k", Value::String("v".to_string())).await.expect("set");

    assert_eq!(
        expected_path,
        home.path().join(".appforge").join("appforge.json")
    );
    assert!(expected_path.is_file());

    // A fresh handle bound to the same path sees the write
    let reopened = settings::SettingsDocument::at(&expected_path);
    let map = reopened.read().await;
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("k"), Some(&Value::String("v".to_string())));
}

#[tokio::test(flavor = "current_thread")]
async fn corrupt_document_reads_as_empty_and_is_recoverable() {
    let home = tempfile::tempdir().expect("tempdir");
    let doc = {
        let _lock = ENV_LOCK.lock().expect("env lock");
        let _guard = HomeGuard::set(Some(home.path()));
        settings::open().expect("open")
    };

    let dir = home.path().join(".appforge");
    std::fs::create_dir_all(&dir).expect("create dir");
    std::fs::write(dir.join("appforge.json"), b"}}} nonsense").expect("write corrupt");

    assert!(doc.read().await.is_empty());

    // Writing over the corrupt file recovers it
    doc.set("teamId", Value::String("T1".to_string()))
        .await
        .expect("set");
    assert_eq!(
        doc.get("teamId").await,
        Some(Value::String("T1".to_string()))
    );
}
