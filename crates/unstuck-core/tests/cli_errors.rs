//! CLI error handling tests for unstuck.
//!
//! These tests verify that invalid arguments and configuration produce
//! appropriate error messages and exit codes. None of them reach a cluster.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a Command for the unstuck binary with no ambient configuration.
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

// ============================================================================
// Argument Parsing
// ============================================================================

mod parsing {
    use super::*;

    #[test]
    fn unknown_command_is_args_error() {
        unstuck()
            .arg("nonexistent-command")
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn non_numeric_escalation_is_args_error() {
        unstuck()
            .args(["plan", "namespace", "shop", "--max-escalation", "high"])
            .assert()
            .code(10);
    }

    #[test]
    fn help_succeeds() {
        unstuck()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("diagnose"));
    }

    #[test]
    fn missing_target_type_is_rejected() {
        unstuck()
            .args(["-o", "text", "plan"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("target type is required"));
    }
}

// ============================================================================
// Escalation Validation
// ============================================================================

mod escalation {
    use super::*;

    #[test]
    fn out_of_range_level_is_rejected() {
        unstuck()
            .args(["-o", "text", "plan", "--max-escalation", "5", "--from-report"])
            .arg(fixture("stuck_namespace_report.json"))
            .assert()
            .code(10)
            .stderr(predicate::str::contains("between 0 and 4"));
    }

    #[test]
    fn force_level_requires_allow_force() {
        unstuck()
            .args(["-o", "text", "apply", "--dry-run", "--max-escalation", "3"])
            .arg("--from-report")
            .arg(fixture("stuck_namespace_report.json"))
            .assert()
            .code(10)
            .stderr(predicate::str::contains("--allow-force is required"));
    }

    #[test]
    fn structured_error_goes_to_stdout_as_json() {
        let output = unstuck()
            .args(["-o", "json", "plan", "--max-escalation", "4", "--from-report"])
            .arg(fixture("stuck_namespace_report.json"))
            .assert()
            .code(10)
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value =
            serde_json::from_slice(&output).expect("error output should be JSON");
        assert_eq!(json["category"], "config");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("--allow-force is required"));
    }
}

// ============================================================================
// Files
// ============================================================================

mod files {
    use super::*;

    #[test]
    fn missing_config_file_is_args_error() {
        unstuck()
            .args(["-o", "text", "--config", "/nonexistent/unstuck/config.toml"])
            .args(["plan", "--from-report"])
            .arg(fixture("stuck_namespace_report.json"))
            .assert()
            .code(10)
            .stderr(predicate::str::contains("Failed to read"));
    }

    #[test]
    fn unknown_config_key_is_args_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[plan]\nmax_level = 3").unwrap();
        unstuck()
            .args(["-o", "text", "--config"])
            .arg(file.path())
            .args(["plan", "--from-report"])
            .arg(fixture("stuck_namespace_report.json"))
            .assert()
            .code(10)
            .stderr(predicate::str::contains("Invalid TOML"));
    }

    #[test]
    fn config_file_level_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[plan]\nmax_escalation = 4").unwrap();
        unstuck()
            .args(["-o", "text", "--config"])
            .arg(file.path())
            .args(["plan", "--from-report"])
            .arg(fixture("stuck_namespace_report.json"))
            .assert()
            .code(10);
    }

    #[test]
    fn missing_report_is_io_error() {
        unstuck()
            .args(["-o", "text", "plan", "--from-report", "/nonexistent/report.json"])
            .assert()
            .code(21)
            .stderr(predicate::str::contains("I/O Error"));
    }

    #[test]
    fn malformed_report_is_io_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"target\": 42}}").unwrap();
        unstuck()
            .args(["-o", "text", "plan", "--from-report"])
            .arg(file.path())
            .assert()
            .code(21)
            .stderr(predicate::str::contains("JSON Parse Error"));
    }
}

// ============================================================================
// Schema / Version
// ============================================================================

mod info {
    use super::*;

    #[test]
    fn unknown_schema_type_fails() {
        unstuck()
            .args(["schema", "NoSuchType"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("unknown schema type"));
    }

    #[test]
    fn schema_list_json_is_an_array() {
        let output = unstuck()
            .args(["-o", "json", "schema", "--list"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let types = json.as_array().expect("schema list should be an array");
        assert!(types.iter().any(|t| t["name"] == "DiagnosisReport"));
        assert!(types.iter().any(|t| t["name"] == "ApplyResult"));
    }

    #[test]
    fn schema_for_plan_is_json_schema() {
        let output = unstuck()
            .args(["schema", "Plan"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["title"], "Plan");
    }

    #[test]
    fn version_json() {
        unstuck()
            .args(["-o", "json", "version"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"unstuck_version\""));
    }

    #[test]
    fn completions_for_bash() {
        unstuck()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("unstuck"));
    }
}
