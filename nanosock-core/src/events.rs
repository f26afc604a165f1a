//! Socket event channel.
//!
//! Typed replacement for string-named events: every listener gets its own
//! channel receiver, and a listener detaches by dropping it.

use crate::error::SocketError;
use bytes::Bytes;
use std::fmt;
use tracing::warn;

/// Events emitted by sockets and devices.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// A message was received (raw event, independent of backpressure).
    Message(Bytes),

    /// An asynchronous failure.
    Error(SocketError),

    /// A survey window closed.
    SurveyTimeout,

    /// The inbound stream ended.
    End,

    /// The socket released its transport handle.
    Close,
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(msg) => write!(f, "Message ({} bytes)", msg.len()),
            Self::Error(err) => write!(f, "Error: {err}"),
            Self::SurveyTimeout => f.write_str("Survey timeout"),
            Self::End => f.write_str("End of stream"),
            Self::Close => f.write_str("Closed"),
        }
    }
}

/// Handle for receiving events.
pub type EventStream = flume::Receiver<SocketEvent>;

/// Fan-out of events to every live listener.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Vec<flume::Sender<SocketEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener.
    pub fn subscribe(&mut self) -> EventStream {
        let (tx, rx) = flume::unbounded();
        self.listeners.push(tx);
        rx
    }

    /// Deliver `event` to every listener, forgetting the ones that were dropped.
    pub fn emit(&mut self, event: SocketEvent) {
        self.listeners.retain(|tx| !tx.is_disconnected());

        if self.listeners.is_empty() {
            if let SocketEvent::Error(err) = &event {
                warn!("Unobserved socket error: {err}");
            }
            return;
        }

        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|tx| !tx.is_disconnected()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = SocketEvent::Message(Bytes::from_static(b"abc"));
        assert_eq!(event.to_string(), "Message (3 bytes)");
        assert_eq!(SocketEvent::SurveyTimeout.to_string(), "Survey timeout");
    }

    #[test]
    fn test_fan_out_and_detach() {
        let mut bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.emit(SocketEvent::End);
        assert!(matches!(first.try_recv(), Ok(SocketEvent::End)));
        assert!(matches!(second.try_recv(), Ok(SocketEvent::End)));

        drop(second);
        bus.emit(SocketEvent::Close);
        assert_eq!(bus.listener_count(), 1);
        assert!(matches!(first.try_recv(), Ok(SocketEvent::Close)));
    }

    #[test]
    fn test_emit_without_listeners_is_harmless() {
        let mut bus = EventBus::new();
        bus.emit(SocketEvent::Error(SocketError::invalid_operation("nobody listens")));
        assert_eq!(bus.listener_count(), 0);
    }
}
