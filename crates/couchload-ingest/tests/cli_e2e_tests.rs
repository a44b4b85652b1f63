//! End-to-end tests for the couchload binary
//!
//! These tests validate:
//! - Exit status for reported and aborted runs
//! - Human-readable and JSON report output
//! - Argument and format errors

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn couchload(file: &Path, db: &str, url: &str) -> Command {
    let mut cmd = Command::cargo_bin("couchload").unwrap();
    cmd.env_remove("COUCHDB_URL")
        .env_remove("COUCHDB_USER")
        .env_remove("COUCHDB_PASSWORD")
        .env_remove("COUCHLOAD_BATCH_SIZE")
        .env_remove("COUCHLOAD_GUARD_TIMEOUT_SECS")
        .env_remove("COUCHLOAD_SUBMIT_TIMEOUT_SECS")
        .env("NO_COLOR", "1")
        .arg("--file")
        .arg(file)
        .arg("--db")
        .arg(db)
        .arg("--url")
        .arg(url);
    cmd
}

async fn mount_existing_db(server: &MockServer, db: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", db)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"db_name": db})))
        .mount(server)
        .await;
}

// ============================================================================
// Reported Runs
// ============================================================================

#[tokio::test]
async fn test_import_csv_prints_summary() {
    let server = MockServer::start().await;
    mount_existing_db(&server, "people").await;

    Mock::given(method("POST"))
        .and(path("/people/_bulk_docs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"ok": true, "id": "1", "rev": "1-a"},
            {"ok": true, "id": "2", "rev": "1-b"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, file) = common::fixture("people.csv", "name,age\nalice,31\nbob,42\n");

    couchload(&file, "people", &server.uri())
        .assert()
        .success()
        .stdout(predicate::str::contains("Import complete"))
        .stdout(predicate::str::contains("Submitted:     2"))
        .stdout(predicate::str::contains("Accepted:      2"));
}

#[tokio::test]
async fn test_rejections_are_listed_but_exit_zero() {
    let server = MockServer::start().await;
    mount_existing_db(&server, "people").await;

    Mock::given(method("POST"))
        .and(path("/people/_bulk_docs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"ok": true, "id": "alice", "rev": "1-a"},
            {"id": "bob", "error": "conflict", "reason": "Document update conflict."}
        ])))
        .mount(&server)
        .await;

    let (_dir, file) = common::fixture("people.csv", "name\nalice\nbob\n");

    couchload(&file, "people", &server.uri())
        .arg("--id-column")
        .arg("name")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rejected:      1"))
        .stdout(predicate::str::contains("bob: conflict"));
}

#[tokio::test]
async fn test_json_report_output() {
    let server = MockServer::start().await;
    mount_existing_db(&server, "events").await;

    Mock::given(method("POST"))
        .and(path("/events/_bulk_docs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"ok": true, "id": "1", "rev": "1-a"}
        ])))
        .mount(&server)
        .await;

    let (_dir, file) = common::fixture("events.jsonl", "{\"kind\": \"click\"}\n");

    let output = couchload(&file, "events", &server.uri())
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["collection"], "events");
    assert_eq!(report["format"], "structured");
    assert_eq!(report["total_accepted"], 1);
    assert_eq!(report["cancelled"], false);
}

// ============================================================================
// Aborted Runs
// ============================================================================

#[tokio::test]
async fn test_guard_failure_exits_non_zero() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/people"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/people/_bulk_docs"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, file) = common::fixture("people.csv", "name\nalice\n");

    couchload(&file, "people", &server.uri())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Collection 'people' is not usable"));
}

#[test]
fn test_unsupported_extension_exits_non_zero() {
    let (_dir, file) = common::fixture("notes.txt", "hello");

    couchload(&file, "notes", "http://127.0.0.1:9")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported file format"));
}

#[test]
fn test_missing_arguments_exit_with_usage_error() {
    Command::cargo_bin("couchload")
        .unwrap()
        .arg("--db")
        .arg("people")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--file"));
}

#[test]
fn test_help_lists_flags() {
    Command::cargo_bin("couchload")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--id-column"))
        .stdout(predicate::str::contains("--batch-size"));
}
