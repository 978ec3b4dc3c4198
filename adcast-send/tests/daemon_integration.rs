//! Integration tests for the adcast-send daemon

use assert_cmd::Command;
use libadcaster::types::{Recurrence, ScheduleStatus};
use libadcaster::{AdFormat, Database, Plan, Product, ScheduleEntry, Tenant};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Setup test environment with config and database
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[scheduling]
poll_interval = 1
"#,
        db_path.display().to_string().replace('\\', "/")
    );

    fs::write(&config_path, config_content).unwrap();

    // Initialize database
    let _db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        db_path.to_str().unwrap().to_string(),
    )
}

/// Create a schedule entry that is already due
async fn create_due_schedule(db_path: &str) -> (String, String) {
    let db = Database::new(db_path).await.unwrap();

    let tenant = Tenant::new("Acme".to_string(), Plan::Business);
    db.create_tenant(&tenant).await.unwrap();
    let product = Product::new(
        tenant.id.clone(),
        "Solar Lantern".to_string(),
        "Compact lantern".to_string(),
        vec!["waterproof".to_string()],
        "campers".to_string(),
        None,
    );
    db.create_product(&product).await.unwrap();

    let entry = ScheduleEntry::new(
        tenant.id.clone(),
        product.id.clone(),
        "facebook".to_string(),
        AdFormat::Text,
        "at:10:00".to_string(),
        Recurrence::Once,
        chrono::Utc::now().timestamp() - 10,
    );
    db.create_schedule(&entry).await.unwrap();
    (tenant.id, entry.id)
}

// BASIC FUNCTIONALITY TESTS

#[tokio::test]
async fn test_daemon_starts_with_config() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();
}

#[tokio::test]
async fn test_once_flag_exits_immediately() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("adcast-send daemon starting"))
        .stderr(predicate::str::contains("processed schedules once, exiting"));
}

#[tokio::test]
async fn test_custom_poll_interval() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .arg("--poll-interval")
        .arg("30")
        .assert()
        .success()
        .stderr(predicate::str::contains("Poll interval: 30s"));
}

#[tokio::test]
async fn test_poll_interval_from_config() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Poll interval: 1s"));
}

// SCHEDULE PROCESSING TESTS

#[tokio::test]
async fn test_processes_due_schedule_without_adapter() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let (tenant_id, schedule_id) = create_due_schedule(&db_path).await;

    // Fund the tenant so the run charge goes through
    let db = Database::new(&db_path).await.unwrap();
    let ledger = libadcaster::UsageLedger::new(db.clone(), libadcaster::BillingRates::default());
    ledger.add_funds(&tenant_id, 5.0, "test topup").await.unwrap();

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    // No platform sections in the config, so the publish fails, but the
    // daemon itself exits cleanly
    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed 1 due schedule(s)"));

    // The entry was marked failed rather than left pending
    let stored = db.get_schedule(&tenant_id, &schedule_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScheduleStatus::Failed);
    assert!(stored.last_error.is_some());
}

#[tokio::test]
async fn test_no_schedules_due() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed").not());
}

// ERROR HANDLING TESTS

#[tokio::test]
async fn test_daemon_requires_valid_config() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");

    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure();
}

#[tokio::test]
async fn test_handles_missing_config_gracefully() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent_config = temp_dir.path().join("nonexistent.toml");

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", nonexistent_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure();
}

// OUTPUT TESTS

#[tokio::test]
async fn test_json_log_format_from_env() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    // One JSON object per line, with the message flattened into it
    cmd.env("ADCASTER_CONFIG", &config_path)
        .env("ADCASTER_LOG_FORMAT", "json")
        .env_remove("RUST_LOG")
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "\"message\":\"adcast-send daemon starting\"",
        ));
}

#[tokio::test]
async fn test_log_level_from_env() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    // At error level the startup banner is filtered out
    cmd.env("ADCASTER_CONFIG", &config_path)
        .env("ADCASTER_LOG_LEVEL", "error")
        .env_remove("RUST_LOG")
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("daemon starting").not());
}

#[tokio::test]
async fn test_logs_shutdown_message() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("adcast-send").unwrap();

    cmd.env("ADCASTER_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("adcast-send daemon stopped"));
}
