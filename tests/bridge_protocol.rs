//! Integration tests for the subprocess reply protocol, using a fake
//! toolchain of shell scripts that speak the real contract: progress on
//! stdout, one JSON document on stderr.

#![cfg(unix)]

use appforge_provision::bridge::{AppMetadata, CredentialBridge, Credentials};
use appforge_provision::error::ProvisionError;
use appforge_provision::launcher::LaunchSession;
use appforge_provision::reply::{Reply, MALFORMED_REPLY_REASON};
use appforge_provision::toolchain::Toolchain;
use std::path::Path;

fn install_entry(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write entry script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("mark script executable");
}

fn creds() -> Credentials {
    Credentials {
        account_id: "dev@example.com".to_string(),
        secret: "secret".to_string(),
    }
}

#[tokio::test]
async fn validate_parses_teams_from_the_error_stream() {
    let dir = tempfile::tempdir().expect("tempdir");
    install_entry(
        dir.path(),
        "validate_apple_credentials",
        r#"#!/bin/sh
echo "Logging in as $1..."
echo "Fetching teams"
printf '{"result":"success","teams":[{"teamId":"T1","name":"N","type":"x"}]}' >&2
"#,
    );

    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    let teams = bridge.validate_credentials(&creds()).await.expect("validate");

    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].team_id, "T1");
    assert_eq!(teams[0].name, "N");
    assert_eq!(teams[0].kind, "x");
}

#[tokio::test]
async fn stdout_is_forwarded_but_never_parsed() {
    let dir = tempfile::tempdir().expect("tempdir");
    // stdout deliberately carries a decoy JSON document; only stderr counts.
    install_entry(
        dir.path(),
        "validate_apple_credentials",
        r#"#!/bin/sh
echo '{"result":"failure","reason":"decoy on stdout"}'
printf '{"result":"success","teams":[]}' >&2
"#,
    );

    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    let teams = bridge.validate_credentials(&creds()).await.expect("validate");
    assert!(teams.is_empty());

    // An empty team list is not a protocol failure; it only becomes fatal
    // at selection time.
    let err = appforge_provision::select_team_id(&teams, |_| unreachable!()).unwrap_err();
    assert!(matches!(err, ProvisionError::NoTeams));
}

#[tokio::test]
async fn domain_failure_carries_the_literal_reason() {
    let dir = tempfile::tempdir().expect("tempdir");
    install_entry(
        dir.path(),
        "validate_apple_credentials",
        r#"#!/bin/sh
printf '{"result":"failure","reason":"bad creds"}' >&2
"#,
    );

    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    let err = bridge
        .validate_credentials(&creds())
        .await
        .expect_err("must fail");

    let ProvisionError::ReplyFailure { reason, .. } = err else {
        panic!("expected reply failure, got {err:?}");
    };
    assert_eq!(reason, "bad creds");
}

#[tokio::test]
async fn garbage_reply_is_a_structured_failure_with_raw_dump() {
    let dir = tempfile::tempdir().expect("tempdir");
    install_entry(
        dir.path(),
        "fetch_cert",
        r#"#!/bin/sh
printf 'not json' >&2
"#,
    );

    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    let reply = bridge
        .fetch_cert(&creds(), "T1")
        .await
        .expect("the call itself succeeds");

    assert_eq!(
        reply,
        Reply::Failure {
            reason: MALFORMED_REPLY_REASON.to_string(),
            raw_dump: "not json".to_string(),
        }
    );
}

#[tokio::test]
async fn app_management_passes_fixed_positional_arguments() {
    let dir = tempfile::tempdir().expect("tempdir");
    install_entry(
        dir.path(),
        "app_management",
        r#"#!/bin/sh
printf '{"result":"success","received":["%s","%s","%s","%s","%s","%s"]}' \
    "$1" "$2" "$3" "$4" "$5" "$6" >&2
"#,
    );

    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    let metadata = AppMetadata {
        bundle_identifier: "com.example.app".to_string(),
        app_name: "Example".to_string(),
    };
    let reply = bridge
        .create_app(&creds(), &metadata, "T1")
        .await
        .expect("create app");

    let Reply::Success(value) = reply else {
        panic!("expected success");
    };
    let received: Vec<&str> = value["received"]
        .as_array()
        .expect("received array")
        .iter()
        .map(|v| v.as_str().expect("string arg"))
        .collect();
    assert_eq!(
        received,
        [
            "create",
            "dev@example.com",
            "secret",
            "T1",
            "com.example.app",
            "Example"
        ]
    );
}

#[tokio::test]
async fn missing_entry_point_is_a_spawn_error() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    let err = bridge
        .fetch_cert(&creds(), "T1")
        .await
        .expect_err("spawn must fail");
    assert!(matches!(err, ProvisionError::Spawn { .. }));
}

#[tokio::test]
async fn clean_up_without_staging_does_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut bridge = CredentialBridge::with_session(
        Toolchain::from_root(dir.path()),
        LaunchSession::direct(),
    );
    bridge.clean_up().await.expect("no-op clean up");
}

#[tokio::test]
async fn shell_bridge_stages_invokes_and_cleans_up() {
    let scripts = tempfile::tempdir().expect("tempdir");
    install_entry(
        scripts.path(),
        "fetch_cert",
        r#"#!/bin/sh
echo "fetching cert for team $3"
printf '{"certId":"C1","account":"%s"}' "$1" >&2
"#,
    );

    let mut session = LaunchSession::shell_bridged("/bin/bash");

    // First staging creates the scratch copy; the second reuses it.
    let staged = session
        .ensure_staged(scripts.path())
        .await
        .expect("stage")
        .expect("scratch path");
    assert!(Path::new(&staged).join("fetch_cert").is_file());
    let again = session
        .ensure_staged(scripts.path())
        .await
        .expect("re-stage")
        .expect("scratch path");
    assert_eq!(staged, again);

    let args = vec![
        "dev@example.com".to_string(),
        "secret".to_string(),
        "T1".to_string(),
    ];
    let raw = session
        .spawn_and_collect(&scripts.path().join("fetch_cert"), &args, scripts.path())
        .await
        .expect("invoke through shell");
    let Reply::Success(value) = Reply::decode(&raw) else {
        panic!("expected success, got {raw:?}");
    };
    assert_eq!(value["certId"], "C1");
    assert_eq!(value["account"], "dev@example.com");

    session.clean_up().await.expect("clean up");
    assert!(session.scratch_path().is_none());
    assert!(!Path::new(&staged).exists());
}
