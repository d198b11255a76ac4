// src/notify/mod.rs
pub mod channel;
pub mod console;

use std::sync::Arc;

use crate::incident::Incident;

pub use channel::ChannelSink;
pub use console::{ConsoleSink, OutputFormat};

/// Downstream receiver of newly detected incidents.
///
/// Called synchronously from the polling task, once per incident, in discovery
/// order for that source. Async delivery belongs behind a [`ChannelSink`].
pub trait EventSink: Send + Sync {
    fn handle(&self, incident: Incident);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn handle(&self, incident: Incident) {
        (**self).handle(incident)
    }
}

/// Fans an incident out to several sinks in registration order.
#[derive(Default)]
pub struct SinkMux {
    sinks: Vec<Box<dyn EventSink>>,
}

impl SinkMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for SinkMux {
    fn handle(&self, incident: Incident) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for s in rest {
                s.handle(incident.clone());
            }
            last.handle(incident);
        }
    }
}
