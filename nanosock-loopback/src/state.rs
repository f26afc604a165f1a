//! Per-handle state of the loopback fabric.

use bytes::Bytes;
use hashbrown::HashSet;
use nanosock_core::protocol::{Domain, Protocol};
use nanosock_core::transport::{EndpointId, Interest, RawHandle};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default inbox capacity, in messages.
pub const DEFAULT_BUFFER: usize = 128;

/// Default survey window.
pub const DEFAULT_SURVEY_DEADLINE: Duration = Duration::from_millis(1000);

/// A queued inbound message and the handle it came from.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub from: RawHandle,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndpointKind {
    Bind,
    Connect,
}

#[derive(Debug, Clone)]
pub(crate) struct EndpointRecord {
    pub id: EndpointId,
    pub key: String,
    pub kind: EndpointKind,
}

/// A linked peer and the local endpoint the link came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Peer {
    pub handle: RawHandle,
    pub via: EndpointId,
}

/// Tasks waiting for readiness, per direction.
#[derive(Debug, Default)]
pub(crate) struct Waiters {
    send: Vec<flume::Sender<()>>,
    recv: Vec<flume::Sender<()>>,
}

impl Waiters {
    pub fn register(&mut self, interest: Interest) -> flume::Receiver<()> {
        let (tx, rx) = flume::bounded(1);
        let list = match interest {
            Interest::Send => &mut self.send,
            Interest::Receive => &mut self.recv,
        };
        // waits that were abandoned (dropped futures) leave disconnected senders
        list.retain(|tx| !tx.is_disconnected());
        list.push(tx);
        rx
    }

    pub fn wake(&mut self, interest: Interest) {
        let list = match interest {
            Interest::Send => &mut self.send,
            Interest::Receive => &mut self.recv,
        };
        for tx in list.drain(..) {
            let _ = tx.try_send(());
        }
    }

    pub fn wake_all(&mut self) {
        self.wake(Interest::Send);
        self.wake(Interest::Receive);
    }
}

#[derive(Debug)]
pub(crate) struct SocketState {
    pub domain: Domain,
    pub protocol: Protocol,
    pub inbox: VecDeque<Envelope>,
    pub rcvbuf: usize,
    pub sndbuf: usize,
    pub linger: i64,
    pub name: String,
    pub peers: SmallVec<[Peer; 4]>,
    pub cursor: usize,
    pub endpoints: Vec<EndpointRecord>,
    pub subscriptions: HashSet<Bytes>,
    /// Origin of the last request / survey received (REP, RESPONDENT).
    pub reply_to: Option<RawHandle>,
    /// REQ sent a request and has not yet received the reply.
    pub awaiting_reply: bool,
    /// End of the current survey window (SURVEYOR).
    pub survey_deadline: Option<Instant>,
    pub deadline: Duration,
    pub waiters: Waiters,
}

impl SocketState {
    pub fn new(handle: RawHandle, domain: Domain, protocol: Protocol) -> Self {
        Self {
            domain,
            protocol,
            inbox: VecDeque::new(),
            rcvbuf: DEFAULT_BUFFER,
            sndbuf: DEFAULT_BUFFER,
            linger: 1000,
            name: handle.0.to_string(),
            peers: SmallVec::new(),
            cursor: 0,
            endpoints: Vec::new(),
            subscriptions: HashSet::new(),
            reply_to: None,
            awaiting_reply: false,
            survey_deadline: None,
            deadline: DEFAULT_SURVEY_DEADLINE,
            waiters: Waiters::default(),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.domain.is_raw()
    }

    pub fn peer_handles(&self) -> SmallVec<[RawHandle; 4]> {
        self.peers.iter().map(|p| p.handle).collect()
    }

    pub fn has_room(&self) -> bool {
        self.inbox.len() < self.rcvbuf
    }

    /// SUB prefix filter; no subscription means everything passes.
    pub fn accepts(&self, body: &Bytes) -> bool {
        self.protocol != Protocol::Sub
            || self.subscriptions.is_empty()
            || self.subscriptions.iter().any(|topic| body.starts_with(topic))
    }

    pub fn survey_expired(&self, now: Instant) -> bool {
        matches!(self.survey_deadline, Some(deadline) if now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_filter() {
        let mut state = SocketState::new(RawHandle(1), Domain::Normal, Protocol::Sub);
        assert!(state.accepts(&Bytes::from_static(b"anything")));

        state.subscriptions.insert(Bytes::from_static(b"trade."));
        assert!(state.accepts(&Bytes::from_static(b"trade.BTC")));
        assert!(!state.accepts(&Bytes::from_static(b"quote.BTC")));
    }

    #[test]
    fn test_waiters_are_one_shot() {
        let mut waiters = Waiters::default();
        let rx = waiters.register(Interest::Receive);
        waiters.wake(Interest::Send);
        assert!(rx.try_recv().is_err());

        waiters.wake(Interest::Receive);
        assert!(rx.try_recv().is_ok());
        waiters.wake(Interest::Receive);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_abandoned_waits_are_pruned() {
        let mut waiters = Waiters::default();
        drop(waiters.register(Interest::Send));
        let _live = waiters.register(Interest::Send);
        assert_eq!(waiters.send.len(), 1);
    }

    #[test]
    fn test_survey_expiry() {
        let mut state = SocketState::new(RawHandle(1), Domain::Normal, Protocol::Surveyor);
        let now = Instant::now();
        assert!(!state.survey_expired(now));
        state.survey_deadline = Some(now);
        assert!(state.survey_expired(now));
    }
}
