//! Device notification channel
//!
//! Controllers report every real value transition through a
//! [`NotificationSink`]: first the property change, then the semantic event.

use crate::pulse::PulseEvent;
use tokio::sync::mpsc;
use tracing::info;

/// A single notification emitted by a pulse controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A property value changed
    PropertyChanged {
        device_id: String,
        property: &'static str,
        value: bool,
    },
    /// A semantic device event
    Event {
        device_id: String,
        event: PulseEvent,
    },
}

impl Notification {
    pub fn device_id(&self) -> &str {
        match self {
            Notification::PropertyChanged { device_id, .. } => device_id,
            Notification::Event { device_id, .. } => device_id,
        }
    }
}

/// Receiver of controller notifications
///
/// Called synchronously while the emitting controller holds its state lock,
/// so implementations must not call back into that controller.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Sink that writes every notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::PropertyChanged {
                device_id,
                property,
                value,
            } => info!(property, "Pulse: {} set to: {}", device_id, value),
            Notification::Event { device_id, event } => {
                info!("{} event: {}", device_id, event)
            }
        }
    }
}

/// Sink that forwards notifications to a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(notification);
    }
}
