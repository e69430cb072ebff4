use crate::hook::Hook;
use crate::record::{Level, LogRecord};
use chrono::Utc;
use std::cell::Cell;
use std::collections::BTreeMap;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns every event into a [`LogRecord`]
/// and fires the wrapped [`Hook`] with it.
///
/// The event's `message` becomes the record message; all other event
/// fields become record fields. Events are stamped with the time they are
/// observed, since `tracing` events carry no timestamp of their own.
///
/// A synchronous hook blocks the emitting thread for one round trip. Since
/// a layer cannot return errors to `tracing`, delivery failures are printed
/// to stderr.
///
/// Events emitted while delivering are never forwarded. That covers the
/// targets in [`DELIVERY_TARGETS`] (plus any added with
/// [`StackdriverLayer::ignore_target`]) and anything logged on a thread that
/// is already inside [`Hook::fire`].
pub struct StackdriverLayer {
    hook: Hook,
    ignored_targets: Vec<String>,
}

/// Targets of the HTTP stack under the transport.
pub const DELIVERY_TARGETS: &[&str] = &["hyper", "reqwest", "h2", "rustls", "tower", "want", "mio"];

thread_local! {
    static FIRING: Cell<bool> = const { Cell::new(false) };
}

// Marks the current thread as delivering until dropped.
struct FiringGuard;

impl FiringGuard {
    fn enter() -> Option<Self> {
        if FIRING.with(|firing| firing.replace(true)) {
            None
        } else {
            Some(FiringGuard)
        }
    }
}

impl Drop for FiringGuard {
    fn drop(&mut self) {
        FIRING.with(|firing| firing.set(false));
    }
}

impl StackdriverLayer {
    pub fn new(hook: Hook) -> Self {
        Self {
            hook,
            ignored_targets: DELIVERY_TARGETS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Never forward events whose target is `target` or one of its submodules.
    pub fn ignore_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    pub fn hook(&self) -> &Hook {
        &self.hook
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|ignored| {
            target
                .strip_prefix(ignored.as_str())
                .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

impl<S> Layer<S> for StackdriverLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = Level::from(event.metadata().level());
        if !self.hook.levels().contains(&level) || self.is_ignored(event.metadata().target()) {
            return;
        }
        let _guard = match FiringGuard::enter() {
            Some(guard) => guard,
            None => return,
        };

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.unwrap_or_default(),
            fields,
        };

        if let Err(e) = self.hook.fire(&record) {
            eprintln!("failed to deliver log entry: {}", e);
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    // `info!("...")` hands the message over as `fmt::Arguments`, which lands here.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
