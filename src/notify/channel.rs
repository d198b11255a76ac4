// src/notify/channel.rs
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::EventSink;
use crate::incident::Incident;

/// Hands incidents to an async consumer (Slack, webhook, ...) over an
/// unbounded channel. Sending never blocks the polling task.
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Incident>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<Incident>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn handle(&self, incident: Incident) {
        if let Err(e) = self.tx.send(incident) {
            tracing::warn!(incident = %e.0.id, "incident channel closed, dropping");
        }
    }
}
