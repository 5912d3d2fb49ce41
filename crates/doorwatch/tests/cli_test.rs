//! Integration tests for the `doorwatch` binary.
//!
//! Each test gets its own temp directory for config, inboxes, outbox and
//! state. Nothing reads the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `doorwatch` binary with env isolation.
fn doorwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("doorwatch");
    cmd.env("HOME", "/tmp/doorwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/doorwatch-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/doorwatch-cli-test-nonexistent")
        .env_remove("DOORWATCH_CONFIG")
        .env_remove("DOORWATCH_LOG_JSON")
        .env_remove("DOORWATCH_PIPELINE__TIMEZONE")
        .env_remove("DOORWATCH_PIPELINE__GATE_SCOPE")
        .env_remove("DOORWATCH_CLASSIFIER__ENDPOINT")
        .env_remove("DOORWATCH_CLASSIFIER__API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// A workspace with a config file whose paths all live under `root`.
struct Workspace {
    root: tempfile::TempDir,
}

impl Workspace {
    fn new(endpoint: &str, extra_pipeline: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().display().to_string();
        let config = format!(
            r#"
[pipeline]
timezone = "Europe/Amsterdam"
labels = ["burglar-alert", "no-burglar-alert"]
{extra_pipeline}

[classifier]
endpoint = "{endpoint}"

[paths]
poll_inbox = "{dir}/polls"
camera_inbox = "{dir}/frames"
outbox = "{dir}/outbox"
state_dir = "{dir}/state"
"#
        );
        std::fs::write(root.path().join("config.toml"), config).unwrap();
        for sub in ["polls", "frames"] {
            std::fs::create_dir_all(root.path().join(sub)).unwrap();
        }
        Self { root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn config(&self) -> PathBuf {
        self.path("config.toml")
    }

    fn drop_poll(&self, name: &str, state: i64) {
        let body = format!(
            r#"[{{"smartlockId":234,"accountId":345,"name":"Front door","state":{{"state":{state}}},"updateDate":"2018-09-05T15:13:13.000Z"}}]"#
        );
        std::fs::write(self.path("polls").join(name), body).unwrap();
    }

    fn drop_frame(&self, name: &str) {
        std::fs::write(self.path("frames").join(name), b"\xff\xd8fake-jpeg").unwrap();
    }

    fn run_once(&self) -> std::process::Output {
        doorwatch_cmd()
            .arg("--config")
            .arg(self.config())
            .args(["run", "--once"])
            .output()
            .unwrap()
    }

    fn alerts(&self) -> Vec<serde_json::Value> {
        read_alerts(&self.path("outbox"))
    }
}

fn read_alerts(outbox: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(outbox.join("alerts.jsonl"))
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// An endpoint nothing listens on; the run must not need it.
const UNUSED_ENDPOINT: &str = "http://127.0.0.1:9/classify";

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = doorwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    doorwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("burglar alerts")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("check"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    doorwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("doorwatch"));
}

#[test]
fn test_completions_bash() {
    doorwatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("doorwatch"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    doorwatch_cmd().arg("arm").assert().code(2);
}

// ── check ───────────────────────────────────────────────────────────

#[test]
fn test_check_valid_config() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    doorwatch_cmd()
        .arg("--config")
        .arg(ws.config())
        .arg("check")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("gate scope: global")
                .and(predicate::str::contains("timezone: Europe/Amsterdam"))
                .and(predicate::str::contains("labels: burglar-alert, no-burglar-alert"))
                .and(predicate::str::contains("configuration OK")),
        );
}

#[test]
fn test_check_show_prints_toml() {
    let ws = Workspace::new(UNUSED_ENDPOINT, r#"suppress_labels = ["no-burglar-alert"]"#);
    doorwatch_cmd()
        .arg("--config")
        .arg(ws.config())
        .args(["check", "--show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("suppressed labels: no-burglar-alert")
                .and(predicate::str::contains("[classifier]")),
        );
}

#[test]
fn test_check_rejects_unknown_timezone() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    let output = doorwatch_cmd()
        .arg("--config")
        .arg(ws.config())
        .env("DOORWATCH_PIPELINE__TIMEZONE", "Mars/Olympus")
        .arg("check")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(text.contains("pipeline.timezone"), "{text}");
}

#[test]
fn test_check_requires_classifier_endpoint() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    std::fs::write(ws.config(), "[pipeline]\ntimezone = \"UTC\"\n").unwrap();
    let output = doorwatch_cmd()
        .arg("--config")
        .arg(ws.config())
        .arg("check")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(text.contains("classifier.endpoint"), "{text}");
}

// ── run --once ──────────────────────────────────────────────────────

#[test]
fn test_run_once_emits_lock_alert_and_consumes_inbox() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    ws.drop_poll("0001.json", 3);

    let output = ws.run_once();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("alerts written: 1"),
        "{}",
        combined_output(&output)
    );

    let alerts = ws.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["kind"], "text");
    let text = alerts[0]["text"].as_str().unwrap();
    assert!(text.starts_with("SmartLock 345/234 (Front door)"), "{text}");
    assert!(text.ends_with("new state = UNLOCKED"), "{text}");

    assert!(!ws.path("polls/0001.json").exists());
    assert!(ws.path("state/gate-changelog.jsonl").exists());
    assert!(ws.path("state/dedup-changelog.jsonl").exists());
}

#[test]
fn test_run_once_drops_frames_while_unlocked() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    ws.drop_poll("0001.json", 3);
    ws.drop_frame("front-0001.jpg");

    let output = ws.run_once();
    assert!(output.status.success(), "{}", combined_output(&output));

    let kinds: Vec<String> = ws
        .alerts()
        .iter()
        .map(|a| a["kind"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(kinds, vec!["text"]);
    assert!(!ws.path("frames/front-0001.jpg").exists());
}

#[test]
fn test_run_once_dedups_across_restarts() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    ws.drop_poll("0001.json", 1);
    assert!(ws.run_once().status.success());
    assert_eq!(ws.alerts().len(), 1);

    ws.drop_poll("0002.json", 1);
    assert!(ws.run_once().status.success());
    assert_eq!(ws.alerts().len(), 1, "same state after restart must not alert");

    ws.drop_poll("0003.json", 3);
    assert!(ws.run_once().status.success());
    assert_eq!(ws.alerts().len(), 2);
}

#[test]
fn test_run_once_ephemeral_writes_no_state() {
    let ws = Workspace::new(UNUSED_ENDPOINT, "");
    ws.drop_poll("0001.json", 1);
    let output = doorwatch_cmd()
        .arg("--config")
        .arg(ws.config())
        .args(["run", "--once", "--ephemeral"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(!ws.path("state").exists());
    assert_eq!(ws.alerts().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_once_classifies_frames_while_locked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "probabilities": [0.9, 0.1] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = format!("{}/classify", server.uri());
    let ws = Workspace::new(&endpoint, "");
    ws.drop_poll("0001.json", 1);
    ws.drop_frame("front-0001.jpg");

    let ws = tokio::task::spawn_blocking(move || {
        let output = ws.run_once();
        assert!(output.status.success(), "{}", combined_output(&output));
        ws
    })
    .await
    .unwrap();

    // The lock alert and the photo alert come from different stages, so
    // their order in the outbox is not fixed.
    let alerts = ws.alerts();
    assert_eq!(alerts.len(), 2);
    let photo_alert = alerts.iter().find(|a| a["kind"] == "photo").unwrap();
    assert!(alerts.iter().any(|a| a["kind"] == "text"));
    assert_eq!(
        photo_alert["text"],
        "BEST MATCH: for image front-0001.jpg was burglar-alert (90.00% likely)"
    );
    let photo = PathBuf::from(photo_alert["photo"].as_str().unwrap());
    assert_eq!(std::fs::read(photo).unwrap(), b"\xff\xd8fake-jpeg");
}
