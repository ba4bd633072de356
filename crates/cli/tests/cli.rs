use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Config with every network source switched off and data kept in `dir`
fn offline_config(dir: &TempDir) -> PathBuf {
    let data_dir = dir.path().join("data");
    let content = format!(
        r#"
[general]
data_dir = "{}"

[sources.github]
enabled = false

[sources.gitlab]
enabled = false

[sources.fdroid]
enabled = false

[sources.openlibrary]
enabled = false

[sources.hackernews]
enabled = false
"#,
        data_dir.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("write config");
    path
}

fn harvester(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("harvester");
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("harvester");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[sources.github]"));
    assert!(content.contains("ttl_secs = 3600"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine").expect("write config");

    let mut cmd = cargo_bin_cmd!("harvester");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().expect("temp dir");

    harvester(&dir.path().join("nope.toml"))
        .args(["store", "count"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn fetch_without_sources_serves_bundled_dataset() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    let output = harvester(&config)
        .args(["fetch", "--json"])
        .output()
        .expect("run fetch");

    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let items = value.as_array().expect("json array");
    assert!(!items.is_empty());
    assert!(items.iter().all(|item| item["source"] == "curated"));
    assert!(items[0].get("sourcePriority").is_some());
}

#[test]
fn fetch_text_output_names_origin() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    harvester(&config)
        .arg("fetch")
        .assert()
        .success()
        .stdout(predicate::str::contains("origin: static"));
}

#[test]
fn store_count_is_zero_before_first_harvest() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    harvester(&config)
        .args(["store", "count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
}

#[test]
fn run_once_without_sources_reports_empty_pass() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    harvester(&config)
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 fetched"));
}

#[test]
fn environment_overrides_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    harvester(&config)
        .env("HARVESTER__CACHE__TTL_SECS", "42")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ttl_secs = 42"));
}

#[test]
fn doctor_rejects_unknown_component() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    harvester(&config)
        .args(["doctor", "--check", "llm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown component"));
}

#[test]
fn doctor_reports_empty_store_as_warning() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);

    let output = harvester(&config)
        .args(["doctor", "--check", "store", "--json"])
        .output()
        .expect("run doctor");

    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["store"]["status"], "warn");
    assert_eq!(value["overall"], "warn");
    assert!(value.get("sources").is_none());
}

#[test]
fn config_log_level_applies_without_flag() {
    let dir = TempDir::new().expect("temp dir");
    let config = offline_config(&dir);
    let content = fs::read_to_string(&config).expect("read config");
    fs::write(
        &config,
        content.replace("[general]\n", "[general]\nlog_level = \"debug\"\n"),
    )
    .expect("write config");

    harvester(&config)
        .env_remove("RUST_LOG")
        .args(["store", "count"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Opened item store"));

    harvester(&config)
        .env_remove("RUST_LOG")
        .args(["--log-level", "warn", "store", "count"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Opened item store").not());
}
