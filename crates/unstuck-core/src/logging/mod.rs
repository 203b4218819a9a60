//! Structured logging.
//!
//! stdout carries command payloads only. Everything logged here goes to
//! stderr, either as human-readable lines or as JSONL, including the
//! before/after audit snapshots taken during `apply`.
//!
//! ```ignore
//! init_logging(&LogConfig::resolve(None, None, None, None));
//! let ctx = LogContext::new(generate_run_id(), "kind-dev").with_resource("Namespace/shop");
//! log_event!(ctx, INFO, event_names::PLAN_GENERATED, Stage::Plan, "Generated plan", actions = 4);
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber. Later calls leave the first one in place.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::default().add_directive(config.level.filter().into());

    let human = (config.format == LogFormat::Human).then(|| {
        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false);
        if config.timestamps {
            console.boxed()
        } else {
            console.without_time().boxed()
        }
    });
    let jsonl = (config.format == LogFormat::Jsonl).then(JsonlLayer::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(jsonl)
        .try_init();
}

/// `run-` followed by 12 hex digits.
pub fn generate_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    format!("run-{}", id)
}

/// Emit an event stamped with the context's run id, resource and cluster.
///
/// The level is one of `TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`.
///
/// ```ignore
/// log_event!(ctx, WARN, event_names::APPLY_SKIPPED, Stage::Confirm, "Declined",
///     action_id = action.id.as_str());
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, $level:ident, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)* $(,)?) => {
        tracing::event!(
            target: $event,
            tracing::Level::$level,
            run_id = %$ctx.run_id,
            resource = %$ctx.resource_str(),
            cluster = %$ctx.cluster,
            stage = %$stage,
            $($key = $val,)*
            message = %$msg,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique_and_shaped() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.starts_with("run-"));
        assert!(a[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn defaults_are_quiet_human() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.level, LogLevel::Warn);
    }

    #[test]
    fn init_accepts_every_format() {
        // Only the first call installs a subscriber; the rest are no-ops.
        for (format, timestamps) in [
            (LogFormat::Human, false),
            (LogFormat::Human, true),
            (LogFormat::Jsonl, false),
        ] {
            let config = LogConfig {
                format,
                level: LogLevel::Off,
                timestamps,
            };
            init_logging(&config);
        }
        tracing::info!(target: "run.started", message = "after init");
    }

    #[test]
    fn macro_accepts_every_level() {
        let ctx = LogContext::new("run-test", "kind").with_resource("Pod/shop/x");
        log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "hello");
        log_event!(ctx, DEBUG, event_names::VERIFY_RESULT, Stage::Verify, "checked", ok = true);
        log_event!(ctx, WARN, event_names::APPLY_SKIPPED, Stage::Confirm, "declined", action_id = "action-002",);
        log_event!(ctx, ERROR, event_names::INTERNAL_ERROR, Stage::Report, "boom");
        log_event!(ctx, TRACE, event_names::KUBECTL_CALL, Stage::Diagnose, "kubectl get");
    }
}
