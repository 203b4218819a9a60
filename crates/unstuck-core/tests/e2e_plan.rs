//! End-to-end `unstuck plan` tests driven by saved diagnosis reports.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn unstuck() -> Command {
    let mut cmd = Command::cargo_bin("unstuck").expect("unstuck binary should exist");
    cmd.env_remove("UNSTUCK_CONFIG")
        .env_remove("UNSTUCK_CONFIG_DIR")
        .env_remove("UNSTUCK_LOG")
        .env_remove("UNSTUCK_LOG_FORMAT");
    cmd
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn plan_json(report: &str, extra: &[&str]) -> Value {
    let output = unstuck()
        .args(["-o", "json", "plan", "--from-report"])
        .arg(fixture(report))
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("plan output should be JSON")
}

fn position(actions: &[Value], kind: &str) -> usize {
    actions
        .iter()
        .position(|a| a["type"] == "patch" && a["target"]["kind"] == kind)
        .unwrap_or_else(|| panic!("no patch for {}", kind))
}

#[test]
fn json_envelope_for_stuck_namespace() {
    let json = plan_json("stuck_namespace_report.json", &[]);

    assert_eq!(json["target"]["name"], "shop");
    assert_eq!(json["diagnosis"]["status"], "Terminating");
    assert_eq!(json["plan"]["riskLevel"], "medium");

    let actions = json["plan"]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 5);
    assert_eq!(actions[0]["id"], "action-001");
    assert_eq!(actions[0]["type"], "inspect");
    assert_eq!(json["commands"].as_array().unwrap().len(), 3);

    // The Pod is owned by the ReplicaSet.
    assert!(position(actions, "Pod") < position(actions, "ReplicaSet"));
}

#[test]
fn leaves_come_first_within_a_level() {
    let json = plan_json("owned_blockers_report.json", &[]);

    let keys: Vec<String> = json["plan"]["actions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["type"] == "patch")
        .map(|a| {
            format!(
                "{}/{}",
                a["target"]["kind"].as_str().unwrap(),
                a["target"]["name"].as_str().unwrap()
            )
        })
        .collect();
    assert_eq!(
        keys,
        vec!["Pod/lone", "Pod/x", "ReplicaSet/rs", "Certificate/a-cert"]
    );
}

#[test]
fn informational_level_has_no_commands() {
    let json = plan_json("stuck_namespace_report.json", &["--max-escalation", "0"]);

    let actions = json["plan"]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| a["command"].is_null()));
    assert!(json.get("commands").is_none());
    assert_eq!(json["plan"]["riskLevel"], "none");
}

#[test]
fn yaml_output() {
    unstuck()
        .args(["-o", "yaml", "plan", "--from-report"])
        .arg(fixture("stuck_namespace_report.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("riskLevel: medium"))
        .stdout(predicate::str::contains("name: shop"));
}

#[test]
fn text_output() {
    unstuck()
        .args(["-o", "text", "plan", "--from-report"])
        .arg(fixture("stuck_namespace_report.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("REMEDIATION PLAN: Namespace \"shop\""))
        .stdout(predicate::str::contains("ACTIONS (5 steps)"))
        .stdout(predicate::str::contains("To execute: unstuck apply namespace shop"))
        .stdout(predicate::str::contains("KUBECTL COMMANDS").not());
}

#[test]
fn verbose_text_lists_commands() {
    unstuck()
        .args(["-o", "text", "-v", "plan", "--from-report"])
        .arg(fixture("stuck_namespace_report.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("KUBECTL COMMANDS"))
        .stdout(predicate::str::contains("kubectl patch Pod web-5d9f-x2k -n shop"));
}

#[test]
fn discovery_failure_needs_force_finalize() {
    let json = plan_json(
        "discovery_failure_report.json",
        &["--max-escalation", "4", "--allow-force"],
    );

    let actions = json["plan"]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1]["operation"], "force-finalize");
    assert_eq!(actions[1]["requiresForce"], true);
    assert_eq!(json["plan"]["riskLevel"], "critical");
}

#[test]
fn discovery_failure_at_default_level_only_inspects() {
    let json = plan_json("discovery_failure_report.json", &[]);

    let actions = json["plan"]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["type"], "inspect");
}

#[test]
fn config_file_sets_max_escalation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[plan]\nmax_escalation = 0\n").unwrap();

    let output = unstuck()
        .args(["-o", "json", "--config"])
        .arg(&path)
        .args(["plan", "--from-report"])
        .arg(fixture("stuck_namespace_report.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["plan"]["actions"].as_array().unwrap().len(), 2);

    // The command line beats the file.
    let output = unstuck()
        .args(["-o", "json", "--config"])
        .arg(&path)
        .args(["plan", "--max-escalation", "2", "--from-report"])
        .arg(fixture("stuck_namespace_report.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["plan"]["actions"].as_array().unwrap().len(), 5);
}

#[test]
fn healthy_namespace_needs_nothing() {
    unstuck()
        .args(["-o", "text", "plan", "--from-report"])
        .arg(fixture("healthy_namespace_report.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "The namespace \"default\" is not in Terminating state.",
        ))
        .stdout(predicate::str::contains("No remediation needed."));
}
