//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs. Nothing here talks to a console API.

use std::path::Path;
use std::process::Command;

/// Run a CLI command with `home` as the data directory.
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_c2station"))
        .args(args)
        .env("C2STATION_HOME", home)
        .env_remove("C2STATION_PASSWORD")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

#[test]
fn test_config_path_honours_home() {
    let home = tempfile::tempdir().unwrap();
    let out = run_ok(home.path(), &["config", "path"]);
    assert_eq!(Path::new(out.trim()), home.path().join("config.toml"));
}

#[test]
fn test_config_get_default() {
    let home = tempfile::tempdir().unwrap();
    let out = run_ok(home.path(), &["config", "get", "api.base_url"]);
    assert_eq!(out.trim(), "http://localhost:8000");
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["config", "set", "schedule.tick_interval_secs", "15"]);
    let out = run_ok(home.path(), &["config", "get", "schedule.tick_interval_secs"]);
    assert_eq!(out.trim(), "15");

    let show: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["config", "show"])).unwrap();
    assert_eq!(show["schedule"]["tick_interval_secs"], 15);
}

#[test]
fn test_config_rejects_coarse_tick_and_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "schedule.tick_interval_secs", "120"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "{stderr}");

    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "ui.dark_mode"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown config key"), "{stderr}");
}

#[test]
fn test_devices_add_and_list() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["devices", "add", "D1", "--name", "North gate"]);

    let views: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["devices", "list", "--json"])).unwrap();
    assert_eq!(
        views,
        serde_json::json!([{"deviceId": "D1", "presenceState": "Offline", "lastSignalAt": null}])
    );

    let table = run_ok(home.path(), &["devices", "list"]);
    assert!(table.contains("North gate"));
    assert!(table.contains("never"));
}

#[test]
fn test_schedule_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["devices", "add", "D1"]);

    let id = run_ok(
        home.path(),
        &["schedule", "add", "D1", "audio", "2030-01-01T09:00:00Z", "5", "--note", "night watch"],
    )
    .trim()
    .to_string();
    assert!(id.starts_with("SCHED-"));

    let ops: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["schedule", "list", "--json"])).unwrap();
    assert_eq!(ops[0]["id"], id.as_str());
    assert_eq!(ops[0]["type"], "Audio");
    assert_eq!(ops[0]["duration"], 5);
    assert_eq!(ops[0]["status"], "pending");
    assert_eq!(ops[0]["scheduledDateTime"], "2030-01-01T09:00:00Z");

    run_ok(home.path(), &["schedule", "cancel", &id]);
    let (_, stderr, code) = run_cli(home.path(), &["schedule", "cancel", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("cancelled and can no longer be cancelled"), "{stderr}");

    let table = run_ok(home.path(), &["schedule", "list", "--device", "D1"]);
    assert!(table.contains("cancelled"));
    assert!(table.contains("night watch"));
}

#[test]
fn test_schedule_add_rejects_bad_input() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["devices", "add", "D1"]);

    let (_, stderr, code) =
        run_cli(home.path(), &["schedule", "add", "ghost", "video", "2030-01-01T09:00:00Z", "5"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown device"), "{stderr}");

    let (_, stderr, code) =
        run_cli(home.path(), &["schedule", "add", "D1", "video", "2030-01-01T09:00:00Z", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("positive"), "{stderr}");

    let (_, _, code) = run_cli(home.path(), &["schedule", "add", "D1", "photo", "2030-01-01T09:00:00Z", "5"]);
    assert_ne!(code, 0);
}

#[test]
fn test_schedule_prune_keeps_pending() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["devices", "add", "D1"]);
    run_ok(home.path(), &["schedule", "add", "D1", "video", "2030-01-01T09:00:00Z", "10"]);

    let out = run_ok(home.path(), &["schedule", "prune"]);
    assert!(out.contains("pruned 0"));
    let ops: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["schedule", "list", "--json"])).unwrap();
    assert_eq!(ops.as_array().unwrap().len(), 1);
}

#[test]
fn test_auth_status_and_missing_password() {
    let home = tempfile::tempdir().unwrap();
    let out = run_ok(home.path(), &["auth", "status"]);
    assert!(out.contains("not logged in"));

    let (_, stderr, code) = run_cli(home.path(), &["auth", "login", "--username", "ops"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("C2STATION_PASSWORD"), "{stderr}");
}

#[test]
fn test_devices_show_and_remove() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["devices", "add", "D1"]);
    run_ok(home.path(), &["devices", "add", "D2"]);

    let view: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["devices", "show", "D1"])).unwrap();
    assert_eq!(view["deviceId"], "D1");
    assert_eq!(view["presenceState"], "Offline");

    run_ok(home.path(), &["devices", "remove", "D1"]);
    let views: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["devices", "list", "--json"])).unwrap();
    assert_eq!(views.as_array().unwrap().len(), 1);
    assert_eq!(views[0]["deviceId"], "D2");

    let (_, stderr, code) = run_cli(home.path(), &["devices", "show", "D1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown device"), "{stderr}");
    let (_, stderr, code) = run_cli(home.path(), &["devices", "remove", "D1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown device"), "{stderr}");
}

#[test]
fn test_registry_edits_refused_while_console_runs() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["devices", "add", "D1"]);
    let id = run_ok(home.path(), &["schedule", "add", "D1", "audio", "2030-01-01T09:00:00Z", "5"])
        .trim()
        .to_string();

    std::fs::write(home.path().join("console.lock"), "4242\n").unwrap();

    for args in [
        vec!["schedule", "add", "D1", "video", "2030-01-01T10:00:00Z", "5"],
        vec!["schedule", "cancel", id.as_str()],
        vec!["schedule", "prune"],
        vec!["devices", "remove", "D1"],
    ] {
        let (_, stderr, code) = run_cli(home.path(), &args);
        assert_eq!(code, 1, "{args:?} should be refused");
        assert!(stderr.contains("pid 4242"), "{stderr}");
        assert!(stderr.contains("stdin"), "{stderr}");
    }

    // Reads still work and nothing changed.
    let ops: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["schedule", "list", "--json"])).unwrap();
    assert_eq!(ops.as_array().unwrap().len(), 1);
    assert_eq!(ops[0]["status"], "pending");

    std::fs::remove_file(home.path().join("console.lock")).unwrap();
    run_ok(home.path(), &["schedule", "cancel", &id]);
}

#[test]
fn test_run_refuses_second_console() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("console.lock"), "4242\n").unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["run", "--username", "ops"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("pid 4242"), "{stderr}");
    assert!(home.path().join("console.lock").exists());
}

#[test]
fn test_api_commands_need_a_password() {
    let home = tempfile::tempdir().unwrap();
    for args in [
        vec!["recordings", "list", "D1", "--username", "ops"],
        vec!["recordings", "list", "D1", "--kind", "video", "--username", "ops"],
        vec!["recordings", "download", "audio", "rec-1", "--username", "ops"],
        vec!["recordings", "delete", "audio", "rec-1", "--username", "ops"],
        vec!["devices", "location", "D1", "--history", "5", "--username", "ops"],
    ] {
        let (_, stderr, code) = run_cli(home.path(), &args);
        assert_eq!(code, 1, "{args:?}");
        assert!(stderr.contains("C2STATION_PASSWORD"), "{stderr}");
    }

    let (_, _, code) = run_cli(home.path(), &["recordings", "list", "D1", "--kind", "photo"]);
    assert_ne!(code, 0);
}
