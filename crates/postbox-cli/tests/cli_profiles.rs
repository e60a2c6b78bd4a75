use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn base_cmd(config_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("postbox"));
    cmd.env("POSTBOX_CONFIG_DIR", config_dir)
        .env("POSTBOX_SECRET_BACKEND", "file")
        .env_remove("POSTBOX_PROFILE")
        .env_remove("POSTBOX_CLIENT_ID")
        .env_remove("POSTBOX_CLIENT_SECRET")
        .env_remove("POSTBOX_TOKENS")
        .env_remove("POSTBOX_TOKEN_URL")
        .env_remove("POSTBOX_USERINFO_URL");
    cmd
}

fn bundle(profile: &str, email: &str, tokens: serde_json::Value) -> String {
    json!({
        "version": 1,
        "profile": profile,
        "email": email,
        "clientId": "cid",
        "clientSecret": "csecret",
        "tokens": tokens
    })
    .to_string()
}

fn import(config_dir: &Path, payload: String) {
    base_cmd(config_dir)
        .args(["profile", "import"])
        .write_stdin(payload)
        .assert()
        .success();
}

#[test]
fn status_without_profiles_reports_unauthenticated() {
    let dir = tempdir().expect("tempdir");
    base_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("profile: default"))
        .stdout(predicate::str::contains("authenticated: no"))
        .stdout(predicate::str::contains("secret backend: file"));

    base_cmd(dir.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles yet"));
}

#[test]
fn imported_profiles_can_be_listed_exported_and_switched() {
    let dir = tempdir().expect("tempdir");
    import(
        dir.path(),
        bundle("work", "a@x.com", json!({"access_token": "at-w", "refresh_token": "rt-w"})),
    );
    import(
        dir.path(),
        bundle("personal", "b@y.com", json!({"access_token": "at-p"})),
    );

    base_cmd(dir.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* personal\tb@y.com"))
        .stdout(predicate::str::contains("  work\ta@x.com"));

    let output = base_cmd(dir.path())
        .args(["--profile", "work", "profile", "export"])
        .output()
        .expect("export");
    assert!(output.status.success());
    let exported: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(exported["profile"], "work");
    assert_eq!(exported["clientSecret"], "csecret");
    assert_eq!(exported["tokens"]["refresh_token"], "rt-w");

    base_cmd(dir.path())
        .args(["profile", "delete", "personal"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is active"));

    base_cmd(dir.path())
        .args(["profile", "use", "work"])
        .assert()
        .success();
    base_cmd(dir.path())
        .args(["profile", "delete", "personal"])
        .assert()
        .success();
    base_cmd(dir.path())
        .args(["--profile", "personal", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("authenticated: no"));
}

#[test]
fn import_requires_force_to_overwrite() {
    let dir = tempdir().expect("tempdir");
    import(dir.path(), bundle("work", "a@x.com", json!({"access_token": "old"})));

    base_cmd(dir.path())
        .args(["profile", "import"])
        .write_stdin(bundle("work", "a@x.com", json!({"access_token": "new"})))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    base_cmd(dir.path())
        .args(["profile", "import", "--force", "--name", "work"])
        .write_stdin(bundle("work", "a@x.com", json!({"access_token": "new"})))
        .assert()
        .success();

    base_cmd(dir.path())
        .args(["profile", "export"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"new\""));
}

#[test]
fn unsupported_bundle_version_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let payload = json!({
        "version": 2,
        "profile": "work",
        "clientId": "cid",
        "clientSecret": "csecret",
        "tokens": {"access_token": "at"}
    });
    base_cmd(dir.path())
        .args(["profile", "import"])
        .write_stdin(payload.to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported export bundle version 2"));
    assert!(!dir.path().join("profiles.json").exists());
}

#[test]
fn corrupt_registry_is_reported_and_kept() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("profiles.json");
    fs::write(&path, "{not json").expect("write");

    base_cmd(dir.path())
        .args(["profile", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("remove it and log in again"));
    assert_eq!(fs::read_to_string(&path).expect("read"), "{not json");
}

#[test]
fn whoami_requires_login() {
    let dir = tempdir().expect("tempdir");
    base_cmd(dir.path())
        .args(["--profile", "work", "whoami"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("postbox login --profile work"));
}

#[test]
fn invalid_profile_name_is_rejected() {
    let dir = tempdir().expect("tempdir");
    base_cmd(dir.path())
        .args(["--profile", "../etc", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid profile name"));
}

#[test]
fn whoami_refreshes_expired_token_and_persists_rotation() {
    let dir = tempdir().expect("tempdir");
    let mut server = Server::new();
    import(
        dir.path(),
        bundle(
            "work",
            "old@x.com",
            json!({"access_token": "at-1", "refresh_token": "rt-1", "expiry_date": 1_000}),
        ),
    );

    let refresh = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "rt-1".into()),
            Matcher::UrlEncoded("client_id".into(), "cid".into()),
        ]))
        .with_status(200)
        .with_body(json!({"access_token": "at-2", "expires_in": 3600}).to_string())
        .expect(1)
        .create();
    let userinfo = server
        .mock("GET", "/userinfo")
        .match_header("authorization", "Bearer at-2")
        .with_status(200)
        .with_body(json!({"email": "a@x.com"}).to_string())
        .expect(1)
        .create();

    base_cmd(dir.path())
        .env("POSTBOX_TOKEN_URL", format!("{}/token", server.url()))
        .env("POSTBOX_USERINFO_URL", format!("{}/userinfo", server.url()))
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("a@x.com (profile 'work')"));
    refresh.assert();
    userinfo.assert();

    let output = base_cmd(dir.path())
        .args(["profile", "export"])
        .output()
        .expect("export");
    let exported: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(exported["email"], "a@x.com");
    assert_eq!(exported["tokens"]["access_token"], "at-2");
    assert_eq!(exported["tokens"]["refresh_token"], "rt-1");
}

#[test]
fn failed_refresh_does_not_leak_secrets() {
    let dir = tempdir().expect("tempdir");
    let mut server = Server::new();
    import(
        dir.path(),
        bundle(
            "work",
            "a@x.com",
            json!({"access_token": "at-1", "refresh_token": "rt-1", "expiry_date": 1_000}),
        ),
    );
    server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(
            json!({
                "error": "invalid_grant",
                "error_description": "refresh_token=rt-1 access_token=at-1 revoked"
            })
            .to_string(),
        )
        .create();

    base_cmd(dir.path())
        .env("POSTBOX_TOKEN_URL", format!("{}/token", server.url()))
        .env("POSTBOX_USERINFO_URL", format!("{}/userinfo", server.url()))
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_grant"))
        .stderr(predicate::str::contains("rt-1").not())
        .stderr(predicate::str::contains("at-1").not());
}
