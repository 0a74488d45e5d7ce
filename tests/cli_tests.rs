//! Tests for the `mysql-tool` binary against a temporary SQLite database

#![cfg(feature = "sqlite")]

use assert_cmd::Command;
use mysql_tool::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a config pointing at a fresh database with an `industry` table.
fn setup() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("industry.db");

    let mut client = Client::sqlite(db.to_string_lossy()).unwrap();
    client
        .execute(
            "CREATE TABLE industry (id INTEGER PRIMARY KEY AUTOINCREMENT, industry_name TEXT NOT NULL)",
            &[],
        )
        .unwrap();
    client.close();

    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "[database]\ndriver = \"sqlite\"\ndatabase = {:?}\nmax_retry = 1\n\n[log]\nlevel = \"warn\"\n",
            db.to_string_lossy()
        ),
    )
    .unwrap();
    (dir, config)
}

fn run(config: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    Command::cargo_bin("mysql-tool")
        .unwrap()
        .arg("--config")
        .arg(config)
        .args(args)
        .assert()
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[test]
fn test_ping() {
    let (_dir, config) = setup();
    let assert = run(&config, &["ping"]).success();
    assert!(stdout_of(&assert).starts_with("ok"));
}

#[test]
fn test_import_then_query() {
    let (dir, config) = setup();
    let data = dir.path().join("new_industry1_data");
    fs::write(&data, "retail\n\n   finance  \n\t\nmedia\n").unwrap();

    let assert = run(
        &config,
        &["import", "--table", "industry", "--column", "industry_name", data.to_str().unwrap()],
    )
    .success();
    assert_eq!(stdout_of(&assert).trim(), "imported 3 rows into industry");

    let assert = run(&config, &["query", "SELECT id, industry_name FROM industry ORDER BY id"]).success();
    let lines: Vec<String> = stdout_of(&assert).lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        vec![
            r#"{"id":1,"industry_name":"retail"}"#,
            r#"{"id":2,"industry_name":"finance"}"#,
            r#"{"id":3,"industry_name":"media"}"#,
        ]
    );

    let assert = run(&config, &["query", "SELECT industry_name FROM industry WHERE id = ?", "2"]).success();
    assert_eq!(stdout_of(&assert).trim(), r#"{"industry_name":"finance"}"#);
}

#[test]
fn test_bad_query_fails() {
    let (_dir, config) = setup();
    run(&config, &["query", "SELECT * FROM nowhere"]).failure();
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let assert = run(&dir.path().join("absent.toml"), &["ping"]).failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("Configuration error"));
}
