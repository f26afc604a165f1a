//! Outbound queue.
//!
//! Holds writes the transport refused with would-block, in write order,
//! until send readiness lets them be retried. Entries are only added on
//! would-block and only removed by a flush.

use crate::transport::Flags;
use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt;

/// Completion callback fired once the entry has been accepted by the transport.
pub type Completion = Box<dyn FnOnce()>;

/// One pending write.
pub struct PendingSend {
    /// Payload, already passed through the socket's transform hook.
    pub payload: Bytes,
    pub flags: Flags,
    pub on_sent: Option<Completion>,
}

impl PendingSend {
    pub fn new(payload: Bytes, flags: Flags, on_sent: Option<Completion>) -> Self {
        Self {
            payload,
            flags,
            on_sent,
        }
    }
}

impl fmt::Debug for PendingSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSend")
            .field("len", &self.payload.len())
            .field("flags", &self.flags)
            .field("on_sent", &self.on_sent.is_some())
            .finish()
    }
}

/// FIFO of pending writes.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: VecDeque<PendingSend>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append behind every earlier write.
    pub fn push_back(&mut self, entry: PendingSend) {
        self.entries.push_back(entry);
    }

    /// Return an entry taken by [`pop_front`](Self::pop_front) that still could not be sent.
    pub fn push_front(&mut self, entry: PendingSend) {
        self.entries.push_front(entry);
    }

    /// Oldest pending write.
    pub fn pop_front(&mut self) -> Option<PendingSend> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every pending write; returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(s: &'static str) -> PendingSend {
        PendingSend::new(Bytes::from_static(s.as_bytes()), Flags::NONE, None)
    }

    #[test]
    fn test_fifo_order() {
        let mut q = OutboundQueue::new();
        q.push_back(entry("a"));
        q.push_back(entry("b"));
        q.push_back(entry("c"));

        let first = q.pop_front().unwrap();
        assert_eq!(first.payload, "a");

        // a retried entry goes back ahead of the rest
        q.push_front(first);
        let order: Vec<_> = std::iter::from_fn(|| q.pop_front())
            .map(|e| e.payload)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_clear_reports_discarded() {
        let mut q = OutboundQueue::new();
        q.push_back(entry("x"));
        q.push_back(entry("y"));
        assert_eq!(q.clear(), 2);
        assert_eq!(q.len(), 0);
    }
}
