//! JSONL tracing layer.
//!
//! Each event becomes one [`LogEvent`] line on the writer (stderr in the
//! binary). Correlation fields missing from the event are inherited from
//! enclosing spans, innermost first.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::{Level, LogEvent};

/// `run_id`, `resource`, `cluster`, `stage`: lifted to the top level.
#[derive(Debug, Clone, Default)]
struct Correlation {
    run_id: Option<String>,
    resource: Option<String>,
    cluster: Option<String>,
    stage: Option<String>,
}

impl Correlation {
    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "run_id" => Some(&mut self.run_id),
            "resource" => Some(&mut self.resource),
            "cluster" => Some(&mut self.cluster),
            "stage" => Some(&mut self.stage),
            _ => None,
        }
    }

    fn inherit(&mut self, outer: &Correlation) {
        for (mine, theirs) in [
            (&mut self.run_id, &outer.run_id),
            (&mut self.resource, &outer.resource),
            (&mut self.cluster, &outer.cluster),
            (&mut self.stage, &outer.stage),
        ] {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }
}

/// Collects one event's (or span's) fields.
#[derive(Default)]
struct Collector {
    correlation: Correlation,
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl Collector {
    fn put(&mut self, name: &str, value: Value) {
        if name == "message" {
            self.message = Some(as_text(value));
        } else if let Some(slot) = self.correlation.slot(name) {
            *slot = Some(as_text(value));
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }
}

fn as_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for Collector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field.name(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field.name(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field.name(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field.name(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form.
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field.name(), Value::Number(n));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field.name(), Value::String(format!("{:?}", value)));
    }
}

/// Writes every event as a JSON line.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut collector = Collector::default();
        attrs.record(&mut collector);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(collector.correlation);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut collector = Collector::default();
        event.record(&mut collector);

        let mut correlation = collector.correlation;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(outer) = span.extensions().get::<Correlation>() {
                    correlation.inherit(outer);
                }
            }
        }

        let metadata = event.metadata();
        let mut record = LogEvent::new(Level::from(*metadata.level()), metadata.target());
        record.run_id = correlation.run_id;
        record.resource = correlation.resource.filter(|r| !r.is_empty());
        record.cluster = correlation.cluster;
        record.stage = correlation.stage;
        record.message = collector.message;
        record.fields = collector.fields;

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", record.to_jsonl());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> LogEvent {
        let buffer = Shared::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(buffer.clone()));
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap();
        serde_json::from_slice(bytes.trim_ascii()).expect("one valid JSON line")
    }

    #[test]
    fn writes_level_event_and_message() {
        let line = capture(|| {
            tracing::warn!(target: "apply.skipped", message = "declined");
        });
        assert_eq!(line.level, Level::Warn);
        assert_eq!(line.event, "apply.skipped");
        assert_eq!(line.message.as_deref(), Some("declined"));
    }

    #[test]
    fn correlation_fields_are_lifted() {
        let line = capture(|| {
            tracing::info!(
                target: "plan.generated",
                run_id = "run-abc",
                stage = "plan",
                actions = 4u64,
                message = "planned"
            );
        });
        assert_eq!(line.run_id.as_deref(), Some("run-abc"));
        assert_eq!(line.stage.as_deref(), Some("plan"));
        assert_eq!(line.fields["actions"], 4);
        assert!(!line.fields.contains_key("run_id"));
    }

    #[test]
    fn spans_fill_missing_correlation() {
        let line = capture(|| {
            let outer = tracing::info_span!("run", run_id = "run-outer", cluster = "kind");
            let _outer = outer.enter();
            let inner = tracing::info_span!("apply", run_id = "run-inner");
            let _inner = inner.enter();
            tracing::info!(target: "apply.started", message = "go");
        });
        assert_eq!(line.run_id.as_deref(), Some("run-inner"));
        assert_eq!(line.cluster.as_deref(), Some("kind"));
    }

    #[test]
    fn empty_resource_is_dropped_and_types_kept() {
        let line = capture(|| {
            tracing::info!(target: "t", resource = "", count = 42, ok = true, message = "hi");
        });
        assert!(line.resource.is_none());
        assert_eq!(line.fields["count"], 42);
        assert_eq!(line.fields["ok"], true);
    }
}
