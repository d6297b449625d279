// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Notifications pushed to the hosting application as jobs come and go.

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Current local time as RFC 3339 with whole seconds.
pub fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A job lifecycle notification.  Serialised with an `event` tag carrying
/// the event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PrintEvent {
    #[serde(rename = "print-received")]
    Received {
        #[serde(rename = "type")]
        kind: String,
        content: String,
        time: String,
        printer: String,
    },
    #[serde(rename = "print-success")]
    Success {
        #[serde(rename = "type")]
        kind: String,
        printer: String,
        time: String,
    },
    #[serde(rename = "print-error")]
    Error { error: String, time: String },
}

impl PrintEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received { .. } => "print-received",
            Self::Success { .. } => "print-success",
            Self::Error { .. } => "print-error",
        }
    }
}

/// Receiver of job notifications.  Fire-and-forget: `emit` never fails and
/// never waits for the observer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PrintEvent);
}

/// Fans events out to any number of `tokio::sync::broadcast` subscribers.
pub struct BroadcastSink {
    tx: broadcast::Sender<PrintEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PrintEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: PrintEvent) {
        let name = event.name();
        // No subscribers is fine.
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(event = name, receivers, "event emitted");
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PrintEvent) {}
}
