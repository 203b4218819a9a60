//! Resolution order and load/validate round trips against real files.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tempfile::TempDir;
use unstuck_config::{load_config, ConfigOverrides, ConfigSource, ValidationError};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const ENV_KEYS: &[&str] = &["UNSTUCK_CONFIG", "UNSTUCK_CONFIG_DIR", "XDG_CONFIG_HOME"];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|k| (k.to_string(), env::var(k).ok()))
            .collect();
        for key in keys {
            env::remove_var(key);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

fn write_config(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create config parent");
    }
    fs::write(path, body).expect("write config");
}

#[test]
fn cli_path_beats_environment() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let cli = temp.path().join("cli.toml");
        let from_env = temp.path().join("env.toml");
        write_config(&cli, "[plan]\nmax_escalation = 1\n");
        write_config(&from_env, "[plan]\nmax_escalation = 0\n");
        env::set_var("UNSTUCK_CONFIG", from_env.display().to_string());

        let loaded = load_config(Some(&cli)).expect("load");
        assert_eq!(loaded.path.source, ConfigSource::CliArgument);
        assert_eq!(loaded.config.plan.max_escalation, 1);
    });
}

#[test]
fn env_path_beats_config_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let direct = temp.path().join("direct.toml");
        let dir = temp.path().join("dir");
        write_config(&direct, "[apply]\ndry_run = true\n");
        write_config(&dir.join("config.toml"), "[apply]\ndry_run = false\n");
        env::set_var("UNSTUCK_CONFIG", direct.display().to_string());
        env::set_var("UNSTUCK_CONFIG_DIR", dir.display().to_string());

        let loaded = load_config(None).expect("load");
        assert_eq!(loaded.path.source, ConfigSource::Environment);
        assert_eq!(loaded.path.path.as_deref(), Some(direct.as_path()));
        assert!(loaded.config.apply.dry_run);
    });
}

#[test]
fn config_dir_is_used_when_direct_path_missing() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let dir = temp.path().join("dir");
        write_config(&dir.join("config.toml"), "[cluster]\ncontext = \"kind\"\n");
        env::set_var("UNSTUCK_CONFIG", temp.path().join("nope.toml").display().to_string());
        env::set_var("UNSTUCK_CONFIG_DIR", dir.display().to_string());

        let loaded = load_config(None).expect("load");
        assert_eq!(loaded.path.source, ConfigSource::Environment);
        assert_eq!(loaded.config.cluster.context.as_deref(), Some("kind"));
    });
}

#[test]
fn missing_cli_path_is_an_io_error() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let err = load_config(Some(&temp.path().join("absent.toml"))).expect_err("should fail");
        assert!(matches!(err, ValidationError::IoError(_)));
    });
}

#[test]
fn overrides_then_validation() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let cli = temp.path().join("config.toml");
        write_config(&cli, "[plan]\nmax_escalation = 2\n");

        let loaded = load_config(Some(&cli)).expect("load");
        let err = loaded
            .clone()
            .finalize(&ConfigOverrides {
                max_escalation: Some(4),
                ..Default::default()
            })
            .expect_err("force level without allow_force");
        assert!(matches!(err, ValidationError::SemanticError(_)));

        let (config, snapshot) = loaded
            .finalize(&ConfigOverrides {
                max_escalation: Some(4),
                allow_force: Some(true),
                ..Default::default()
            })
            .expect("valid");
        assert_eq!(config.plan.max_escalation, 4);
        assert_eq!(snapshot.summary.max_escalation, 4);
        assert_eq!(snapshot.source, "CLI argument");
    });
}

#[test]
fn malformed_file_is_a_parse_error() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let cli = temp.path().join("config.toml");
        write_config(&cli, "[plan\nmax_escalation = ");
        let err = load_config(Some(&cli)).expect_err("should fail");
        assert!(matches!(err, ValidationError::ParseError(_)));
    });
}
