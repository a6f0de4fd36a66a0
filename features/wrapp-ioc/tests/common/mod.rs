#![allow(dead_code)]

use std::{fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    Layer,
};

/// Records every event at exactly `level` logged while it is installed
#[derive(Clone)]
pub struct Captured {
    level: Level,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}
impl<S: Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != self.level {
            return;
        }
        let mut captured = CapturedEvent::default();
        event.record(&mut captured);
        self.events.lock().push(captured);
    }
}

/// Message and remaining fields of one event
#[derive(Debug, Clone, Default)]
pub struct CapturedEvent {
    pub message: String,
    pub fields: Vec<(String, String)>,
}
impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}
impl Visit for CapturedEvent {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            name => self.fields.push((name.to_string(), format!("{value:?}"))),
        }
    }
}

/// Runs `work` with a subscriber capturing events of `level` on the current thread
pub fn capture_events<T>(level: Level, work: impl FnOnce() -> T) -> (T, Vec<CapturedEvent>) {
    let captured = Captured {
        level,
        events: Arc::default(),
    };
    let subscriber = tracing_subscriber::registry().with(captured.clone());
    let result = tracing::subscriber::with_default(subscriber, work);
    let events = captured.events.lock().clone();
    (result, events)
}

/// Messages of the warnings logged by `work`
pub fn capture_warnings<T>(work: impl FnOnce() -> T) -> (T, Vec<String>) {
    let (result, events) = capture_events(Level::WARN, work);
    (result, events.into_iter().map(|event| event.message).collect())
}
