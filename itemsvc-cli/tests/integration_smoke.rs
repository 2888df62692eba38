//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_serve_help_lists_database_flags() {
    let mut cmd = Command::cargo_bin("itemsvc").unwrap();
    cmd.arg("serve").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--db-host"))
        .stdout(predicate::str::contains("DB_POOL_MAX"))
        .stdout(predicate::str::contains("FRONT_ORIGIN"))
        .stdout(predicate::str::contains("CORS_METHODS"))
        .stdout(predicate::str::contains("CORS_HEADERS"));
}

#[test]
fn test_help_hides_password_value() {
    let mut cmd = Command::cargo_bin("itemsvc").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .env("DB_PASSWORD", "s3cret-value");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("s3cret-value").not());
}

#[test]
fn test_invalid_pool_max_is_rejected() {
    let mut cmd = Command::cargo_bin("itemsvc").unwrap();
    cmd.arg("serve").env("DB_POOL_MAX", "many");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("DB_POOL_MAX").or(predicate::str::contains("db-pool-max")));
}

#[test]
fn test_unreachable_database_fails_startup() {
    let mut cmd = Command::cargo_bin("itemsvc").unwrap();
    cmd.arg("serve")
        .arg("--bind")
        .arg("127.0.0.1:0")
        .env("DB_HOST", "127.0.0.1")
        .env("DB_PORT", "1")
        .timeout(std::time::Duration::from_secs(30));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("initialization failed"));
}

#[test]
fn test_invalid_cors_method_fails_before_connecting() {
    let mut cmd = Command::cargo_bin("itemsvc").unwrap();
    cmd.arg("serve")
        .env("CORS_METHODS", "GET,NOT A METHOD")
        .env("DB_HOST", "127.0.0.1")
        .env("DB_PORT", "1")
        .timeout(std::time::Duration::from_secs(30));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid CORS configuration"))
        .stderr(predicate::str::contains("initialization failed").not());
}
