//! The loopback fabric: handle table, address registry and routing.
//!
//! Addresses of every scheme are rendezvous names: a bind registers the
//! canonical address, a connect records interest in it, and the two sides
//! are linked as soon as both exist (in either order).
//!
//! Locking rule: at most one socket mutex is held at a time, and no map
//! guard is held while taking one.

use crate::state::{EndpointKind, EndpointRecord, Envelope, Peer, SocketState};
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use nanosock_core::endpoint::Endpoint;
use nanosock_core::error::{Errno, TransportError};
use nanosock_core::options::{
    DOMAIN, LINGER, PROTOCOL, RCVBUF, SNDBUF, SOCKET_NAME, SOL_SOCKET, SUB, SUB_SUBSCRIBE,
    SUB_UNSUBSCRIBE, SURVEYOR, SURVEYOR_DEADLINE,
};
use nanosock_core::protocol::{Domain, Protocol};
use nanosock_core::transport::{EndpointId, Interest, OptionValue, RawHandle};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

type Shared = Arc<Mutex<SocketState>>;
type Result<T> = std::result::Result<T, TransportError>;

enum Delivery {
    Delivered,
    Full,
    Gone,
}

#[derive(Default)]
pub(crate) struct Fabric {
    sockets: DashMap<RawHandle, Shared>,
    bound: DashMap<String, (RawHandle, EndpointId)>,
    connectors: DashMap<String, SmallVec<[(RawHandle, EndpointId); 4]>>,
    next_handle: AtomicU32,
    next_endpoint: AtomicU32,
    terminated: AtomicBool,
}

impl Fabric {
    fn check_live(&self) -> Result<()> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(TransportError::new(Errno::Terminated));
        }
        Ok(())
    }

    fn get(&self, handle: RawHandle) -> Result<Shared> {
        self.check_live()?;
        self.sockets
            .get(&handle)
            .map(|s| s.value().clone())
            .ok_or_else(|| TransportError::new(Errno::BadDescriptor))
    }

    pub fn create(&self, domain: Domain, protocol: Protocol) -> Result<RawHandle> {
        self.check_live()?;
        let handle = RawHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let state = SocketState::new(handle, domain, protocol);
        self.sockets.insert(handle, Arc::new(Mutex::new(state)));
        debug!(handle = %handle, %protocol, ?domain, "[LOOPBACK] Socket created");
        Ok(handle)
    }

    pub fn bind(&self, handle: RawHandle, addr: &str) -> Result<EndpointId> {
        let sock = self.get(handle)?;
        let key = canonical(addr)?;
        let id = self.endpoint_id();

        match self.bound.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(TransportError::with_context(Errno::AddrInUse, &key));
            }
            Entry::Vacant(slot) => {
                slot.insert((handle, id));
            }
        }

        sock.lock().endpoints.push(EndpointRecord {
            id,
            key: key.clone(),
            kind: EndpointKind::Bind,
        });
        debug!(handle = %handle, endpoint = %key, "[LOOPBACK] Bound");

        let pending: SmallVec<[(RawHandle, EndpointId); 4]> = self
            .connectors
            .get(&key)
            .map(|c| c.value().clone())
            .unwrap_or_default();
        for connector in pending {
            self.link((handle, id), connector);
        }
        Ok(id)
    }

    pub fn connect(&self, handle: RawHandle, addr: &str) -> Result<EndpointId> {
        let sock = self.get(handle)?;
        let key = canonical(addr)?;
        let id = self.endpoint_id();

        self.connectors
            .entry(key.clone())
            .or_default()
            .push((handle, id));
        sock.lock().endpoints.push(EndpointRecord {
            id,
            key: key.clone(),
            kind: EndpointKind::Connect,
        });
        debug!(handle = %handle, endpoint = %key, "[LOOPBACK] Connected");

        let listener = self.bound.get(&key).map(|b| *b.value());
        if let Some(listener) = listener {
            self.link(listener, (handle, id));
        }
        Ok(id)
    }

    pub fn shutdown(&self, handle: RawHandle, endpoint: EndpointId) -> Result<()> {
        let sock = self.get(handle)?;
        let (record, dropped) = {
            let mut s = sock.lock();
            let pos = s
                .endpoints
                .iter()
                .position(|e| e.id == endpoint)
                .ok_or_else(|| TransportError::with_context(Errno::Invalid, endpoint))?;
            let record = s.endpoints.remove(pos);
            let dropped = s
                .peers
                .iter()
                .filter(|p| p.via == endpoint)
                .map(|p| p.handle)
                .collect::<SmallVec<[RawHandle; 4]>>();
            s.peers.retain(|p| p.via != endpoint);
            (record, dropped)
        };

        self.forget_endpoint(handle, &record);
        for peer in dropped {
            self.unlink(peer, handle);
        }
        debug!(handle = %handle, endpoint = %record.key, "[LOOPBACK] Endpoint shut down");
        Ok(())
    }

    pub fn close(&self, handle: RawHandle) -> Result<()> {
        self.check_live()?;
        let (_, sock) = self
            .sockets
            .remove(&handle)
            .ok_or_else(|| TransportError::new(Errno::BadDescriptor))?;

        let (records, peers) = {
            let mut s = sock.lock();
            s.waiters.wake_all();
            (std::mem::take(&mut s.endpoints), s.peer_handles())
        };
        for record in &records {
            self.forget_endpoint(handle, record);
        }
        for peer in peers {
            self.unlink(peer, handle);
        }
        debug!(handle = %handle, "[LOOPBACK] Socket closed");
        Ok(())
    }

    pub fn send(&self, handle: RawHandle, payload: &Bytes) -> Result<usize> {
        let sock = self.get(handle)?;
        let (protocol, raw) = {
            let s = sock.lock();
            (s.protocol, s.is_raw())
        };
        if !protocol.can_send() {
            return Err(TransportError::with_context(Errno::NotSupported, protocol));
        }

        match protocol {
            Protocol::Pub | Protocol::Bus => {
                let peers = sock.lock().peer_handles();
                self.fan_out(handle, &peers, payload);
            }
            Protocol::Surveyor => {
                let peers = {
                    let mut s = sock.lock();
                    // late responses to an earlier survey are discarded
                    s.inbox.clear();
                    if !raw {
                        s.survey_deadline = Some(Instant::now() + s.deadline);
                        // receive waiters pick up the new deadline
                        s.waiters.wake(Interest::Receive);
                    }
                    s.peer_handles()
                };
                self.fan_out(handle, &peers, payload);
            }
            Protocol::Push | Protocol::Pair | Protocol::Req => {
                let (peers, start) = {
                    let s = sock.lock();
                    (s.peer_handles(), s.cursor)
                };
                let n = peers.len();
                let target = (0..n)
                    .map(|i| (start + i) % n)
                    .find(|&idx| {
                    matches!(self.deliver(peers[idx], handle, payload), Delivery::Delivered)
                });
                let Some(idx) = target else {
                    return Err(TransportError::new(Errno::Again));
                };
                let mut s = sock.lock();
                s.cursor = idx + 1;
                if protocol == Protocol::Req && !raw {
                    s.awaiting_reply = true;
                }
            }
            Protocol::Rep | Protocol::Respondent => {
                let target = {
                    let mut s = sock.lock();
                    if raw {
                        s.reply_to
                    } else {
                        s.reply_to.take()
                    }
                };
                let Some(target) = target else {
                    return Err(TransportError::with_context(Errno::Fsm, "no request to reply to"));
                };
                if let Delivery::Full = self.deliver(target, handle, payload) {
                    sock.lock().reply_to = Some(target);
                    return Err(TransportError::new(Errno::Again));
                }
            }
            Protocol::Sub | Protocol::Pull => {
                return Err(TransportError::with_context(Errno::NotSupported, protocol));
            }
        }

        trace!(handle = %handle, len = payload.len(), "[LOOPBACK] Sent");
        Ok(payload.len())
    }

    pub fn recv(&self, handle: RawHandle) -> Result<Bytes> {
        let sock = self.get(handle)?;
        let (envelope, peers) = {
            let mut s = sock.lock();
            if !s.protocol.can_receive() {
                return Err(TransportError::with_context(Errno::NotSupported, s.protocol));
            }
            // an idle REQ has nothing to wait for
            if s.protocol == Protocol::Req && !s.is_raw() && !s.awaiting_reply {
                return Err(TransportError::new(Errno::Again));
            }
            if s.protocol == Protocol::Surveyor && !s.is_raw() {
                if s.survey_deadline.is_none() {
                    return Err(TransportError::with_context(Errno::Fsm, "no survey in progress"));
                }
                if s.inbox.is_empty() && s.survey_expired(Instant::now()) {
                    s.survey_deadline = None;
                    return Err(TransportError::with_context(Errno::Fsm, "survey expired"));
                }
            }

            let Some(envelope) = s.inbox.pop_front() else {
                return Err(TransportError::new(Errno::Again));
            };
            match s.protocol {
                Protocol::Req => s.awaiting_reply = false,
                Protocol::Rep | Protocol::Respondent => s.reply_to = Some(envelope.from),
                _ => {}
            }
            (envelope, s.peer_handles())
        };

        // room was freed; senders blocked on this inbox may retry
        for peer in peers {
            if let Ok(p) = self.get(peer) {
                p.lock().waiters.wake(Interest::Send);
            }
        }
        trace!(handle = %handle, len = envelope.body.len(), "[LOOPBACK] Received");
        Ok(envelope.body)
    }

    pub fn is_ready(&self, handle: RawHandle, interest: Interest) -> Result<bool> {
        let sock = self.get(handle)?;
        let s = sock.lock();
        let protocol = s.protocol;
        match interest {
            Interest::Receive => Ok(s.protocol.can_receive()
                && (!s.inbox.is_empty()
                    || (s.protocol == Protocol::Surveyor && s.survey_expired(Instant::now())))),
            Interest::Send => match protocol {
                Protocol::Pub | Protocol::Bus | Protocol::Surveyor => Ok(true),
                Protocol::Rep | Protocol::Respondent => Ok(s.reply_to.is_some()),
                Protocol::Sub | Protocol::Pull => Ok(false),
                Protocol::Push | Protocol::Pair | Protocol::Req => {
                    let peers = s.peer_handles();
                    drop(s);
                    Ok(peers
                        .into_iter()
                        .filter_map(|p| self.get(p).ok())
                        .any(|p| p.lock().has_room()))
                }
            },
        }
    }

    /// Register for a wakeup and report the deadline the wait must not pass.
    pub fn register(
        &self,
        handle: RawHandle,
        interest: Interest,
    ) -> Result<(flume::Receiver<()>, Option<Instant>)> {
        let sock = self.get(handle)?;
        let mut s = sock.lock();
        let deadline = match interest {
            Interest::Receive => s.survey_deadline,
            Interest::Send => None,
        };
        Ok((s.waiters.register(interest), deadline))
    }

    pub fn get_option(&self, handle: RawHandle, level: i32, option: i32) -> Result<OptionValue> {
        let sock = self.get(handle)?;
        let s = sock.lock();
        match (level, option) {
            (SOL_SOCKET, LINGER) => Ok(OptionValue::Int(s.linger)),
            (SOL_SOCKET, SNDBUF) => Ok(OptionValue::Int(s.sndbuf as i64)),
            (SOL_SOCKET, RCVBUF) => Ok(OptionValue::Int(s.rcvbuf as i64)),
            (SOL_SOCKET, DOMAIN) => Ok(OptionValue::Int(s.domain.code().into())),
            (SOL_SOCKET, PROTOCOL) => Ok(OptionValue::Int(s.protocol.code().into())),
            (SOL_SOCKET, SOCKET_NAME) => Ok(OptionValue::Str(s.name.clone())),
            (SURVEYOR, SURVEYOR_DEADLINE) if s.protocol == Protocol::Surveyor => {
                Ok(OptionValue::Int(s.deadline.as_millis() as i64))
            }
            _ => Err(no_option(level, option)),
        }
    }

    pub fn set_option(
        &self,
        handle: RawHandle,
        level: i32,
        option: i32,
        value: &OptionValue,
    ) -> Result<()> {
        let sock = self.get(handle)?;
        let mut s = sock.lock();
        match (level, option, value) {
            (SOL_SOCKET, LINGER, OptionValue::Int(v)) => s.linger = *v,
            (SOL_SOCKET, SNDBUF, OptionValue::Int(v)) => s.sndbuf = positive(*v)?,
            (SOL_SOCKET, RCVBUF, OptionValue::Int(v)) => s.rcvbuf = positive(*v)?,
            (SOL_SOCKET, SOCKET_NAME, OptionValue::Str(v)) => s.name = v.clone(),
            (SUB, SUB_SUBSCRIBE, OptionValue::Str(topic)) if s.protocol == Protocol::Sub => {
                s.subscriptions.insert(Bytes::from(topic.clone()));
            }
            (SUB, SUB_UNSUBSCRIBE, OptionValue::Str(topic)) if s.protocol == Protocol::Sub => {
                if !s.subscriptions.remove(topic.as_bytes()) {
                    return Err(TransportError::with_context(Errno::Invalid, topic));
                }
            }
            (SURVEYOR, SURVEYOR_DEADLINE, OptionValue::Int(ms)) if s.protocol == Protocol::Surveyor => {
                s.deadline = Duration::from_millis(positive(*ms)? as u64);
            }
            (SOL_SOCKET, LINGER | SNDBUF | RCVBUF | SOCKET_NAME, _) => {
                return Err(TransportError::with_context(Errno::Invalid, "wrong option value type"));
            }
            _ => return Err(no_option(level, option)),
        }
        Ok(())
    }

    pub fn term(&self) {
        self.terminated.store(true, Ordering::Release);
        for entry in self.sockets.iter() {
            entry.value().lock().waiters.wake_all();
        }
        debug!("[LOOPBACK] Terminated");
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn bound_addresses(&self) -> Vec<String> {
        self.bound.iter().map(|entry| entry.key().clone()).collect()
    }

    fn endpoint_id(&self) -> EndpointId {
        EndpointId(self.next_endpoint.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn link(&self, (a, via_a): (RawHandle, EndpointId), (b, via_b): (RawHandle, EndpointId)) {
        if a == b {
            return;
        }
        let (Ok(sa), Ok(sb)) = (self.get(a), self.get(b)) else {
            return;
        };
        let pa = sa.lock().protocol;
        let pb = sb.lock().protocol;
        if !pa.is_compatible(pb) {
            debug!(a = %a, b = %b, "[LOOPBACK] Ignoring incompatible peers {pa} / {pb}");
            return;
        }

        for (sock, peer, via) in [(&sa, b, via_a), (&sb, a, via_b)] {
            let mut s = sock.lock();
            if !s.peers.iter().any(|p| p.handle == peer) {
                s.peers.push(Peer { handle: peer, via });
            }
            s.waiters.wake(Interest::Send);
        }
        debug!(a = %a, b = %b, "[LOOPBACK] Linked {pa} <-> {pb}");
    }

    fn unlink(&self, peer: RawHandle, gone: RawHandle) {
        if let Ok(p) = self.get(peer) {
            let mut s = p.lock();
            s.peers.retain(|x| x.handle != gone);
            if s.reply_to == Some(gone) {
                s.reply_to = None;
            }
        }
    }

    fn forget_endpoint(&self, handle: RawHandle, record: &EndpointRecord) {
        match record.kind {
            EndpointKind::Bind => {
                self.bound
                    .remove_if(&record.key, |_, (h, id)| *h == handle && *id == record.id);
            }
            EndpointKind::Connect => {
                if let Some(mut list) = self.connectors.get_mut(&record.key) {
                    list.retain(|(h, id)| !(*h == handle && *id == record.id));
                }
            }
        }
    }

    fn fan_out(&self, from: RawHandle, peers: &[RawHandle], payload: &Bytes) {
        for &peer in peers {
            if let Delivery::Full = self.deliver(peer, from, payload) {
                trace!(from = %from, to = %peer, "[LOOPBACK] Peer inbox full, dropping");
            }
        }
    }

    fn deliver(&self, to: RawHandle, from: RawHandle, payload: &Bytes) -> Delivery {
        let Ok(sock) = self.get(to) else {
            return Delivery::Gone;
        };
        let mut s = sock.lock();
        if !s.accepts(payload) {
            // filtered out counts as delivered
            return Delivery::Delivered;
        }
        if !s.has_room() {
            return Delivery::Full;
        }
        s.inbox.push_back(Envelope {
            from,
            body: payload.clone(),
        });
        s.waiters.wake(Interest::Receive);
        Delivery::Delivered
    }
}

fn canonical(addr: &str) -> Result<String> {
    let endpoint = match Endpoint::parse(addr) {
        // wildcard and loopback spellings all meet at one name
        Ok(Endpoint::Tcp { host, port }) if matches!(host.as_str(), "*" | "0.0.0.0" | "localhost") => {
            Endpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port,
            }
        }
        Ok(endpoint) => endpoint,
        Err(e) => return Err(TransportError::with_context(Errno::Invalid, e)),
    };
    Ok(endpoint.to_string())
}

fn positive(v: i64) -> Result<usize> {
    usize::try_from(v)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| TransportError::with_context(Errno::Invalid, v))
}

fn no_option(level: i32, option: i32) -> TransportError {
    TransportError::with_context(Errno::NoProtocolOption, format!("level {level}, option {option}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fabric() -> Fabric {
        Fabric::default()
    }

    #[test]
    fn test_bind_duplicate() {
        let f = fabric();
        let a = f.create(Domain::Normal, Protocol::Pub).unwrap();
        let b = f.create(Domain::Normal, Protocol::Pub).unwrap();

        assert!(f.bind(a, "inproc://dup").is_ok());
        let err = f.bind(b, "inproc://dup").unwrap_err();
        assert_eq!(err.errno(), Errno::AddrInUse);
    }

    #[test]
    fn test_invalid_address() {
        let f = fabric();
        let a = f.create(Domain::Normal, Protocol::Pub).unwrap();
        assert_eq!(f.bind(a, "bogus").unwrap_err().errno(), Errno::Invalid);
    }

    #[test]
    fn test_connect_before_bind_links() {
        let f = fabric();
        let push = f.create(Domain::Normal, Protocol::Push).unwrap();
        let pull = f.create(Domain::Normal, Protocol::Pull).unwrap();

        f.connect(push, "tcp://127.0.0.1:5000").unwrap();
        assert_eq!(f.send(push, &Bytes::from_static(b"x")).unwrap_err().errno(), Errno::Again);

        f.bind(pull, "tcp://127.0.0.1:5000").unwrap();
        assert_eq!(f.send(push, &Bytes::from_static(b"x")).unwrap(), 1);
        assert_eq!(f.recv(pull).unwrap(), "x");
    }

    #[test]
    fn test_incompatible_peers_are_not_linked() {
        let f = fabric();
        let push = f.create(Domain::Normal, Protocol::Push).unwrap();
        let sub = f.create(Domain::Normal, Protocol::Sub).unwrap();
        f.bind(sub, "inproc://mismatch").unwrap();
        f.connect(push, "inproc://mismatch").unwrap();
        assert!(!f.is_ready(push, Interest::Send).unwrap());
    }

    #[test]
    fn test_push_blocks_when_inbox_full() {
        let f = fabric();
        let push = f.create(Domain::Normal, Protocol::Push).unwrap();
        let pull = f.create(Domain::Normal, Protocol::Pull).unwrap();
        f.bind(pull, "inproc://full").unwrap();
        f.connect(push, "inproc://full").unwrap();
        f.set_option(pull, SOL_SOCKET, RCVBUF, &OptionValue::Int(2)).unwrap();

        let msg = Bytes::from_static(b"m");
        f.send(push, &msg).unwrap();
        f.send(push, &msg).unwrap();
        assert_eq!(f.send(push, &msg).unwrap_err().errno(), Errno::Again);
        assert!(!f.is_ready(push, Interest::Send).unwrap());

        f.recv(pull).unwrap();
        assert!(f.is_ready(push, Interest::Send).unwrap());
    }

    #[test]
    fn test_req_rep_fsm() {
        let f = fabric();
        let req = f.create(Domain::Normal, Protocol::Req).unwrap();
        let rep = f.create(Domain::Normal, Protocol::Rep).unwrap();
        f.bind(rep, "inproc://rr").unwrap();
        f.connect(req, "inproc://rr").unwrap();

        assert!(f.recv(req).unwrap_err().is_would_block());
        assert_eq!(f.send(rep, &Bytes::from_static(b"early")).unwrap_err().errno(), Errno::Fsm);

        f.send(req, &Bytes::from_static(b"ping")).unwrap();
        assert_eq!(f.recv(rep).unwrap(), "ping");
        f.send(rep, &Bytes::from_static(b"pong")).unwrap();
        assert_eq!(f.recv(req).unwrap(), "pong");
        assert!(f.recv(req).unwrap_err().is_would_block());
        // the reply target was consumed
        assert_eq!(f.send(rep, &Bytes::from_static(b"again")).unwrap_err().errno(), Errno::Fsm);
    }

    #[test]
    fn test_survey_expires_with_fsm() {
        let f = fabric();
        let surveyor = f.create(Domain::Normal, Protocol::Surveyor).unwrap();
        f.set_option(surveyor, SURVEYOR, SURVEYOR_DEADLINE, &OptionValue::Int(1))
            .unwrap();

        assert_eq!(f.recv(surveyor).unwrap_err().errno(), Errno::Fsm);
        f.send(surveyor, &Bytes::from_static(b"who?")).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(f.is_ready(surveyor, Interest::Receive).unwrap());
        assert_eq!(f.recv(surveyor).unwrap_err().errno(), Errno::Fsm);
        assert!(!f.is_ready(surveyor, Interest::Receive).unwrap());
    }

    #[test]
    fn test_shutdown_unlinks() {
        let f = fabric();
        let pair_a = f.create(Domain::Normal, Protocol::Pair).unwrap();
        let pair_b = f.create(Domain::Normal, Protocol::Pair).unwrap();
        let id = f.bind(pair_a, "inproc://pair").unwrap();
        f.connect(pair_b, "inproc://pair").unwrap();
        assert!(f.is_ready(pair_b, Interest::Send).unwrap());

        f.shutdown(pair_a, id).unwrap();
        assert!(!f.is_ready(pair_b, Interest::Send).unwrap());
        assert!(f.bound_addresses().is_empty());
        assert_eq!(f.shutdown(pair_a, id).unwrap_err().errno(), Errno::Invalid);
    }

    #[test]
    fn test_close_and_term() {
        let f = fabric();
        let a = f.create(Domain::Normal, Protocol::Bus).unwrap();
        f.close(a).unwrap();
        assert_eq!(f.close(a).unwrap_err().errno(), Errno::BadDescriptor);
        assert_eq!(f.socket_count(), 0);

        f.term();
        assert_eq!(
            f.create(Domain::Normal, Protocol::Bus).unwrap_err().errno(),
            Errno::Terminated
        );
    }

    #[test]
    fn test_options() {
        let f = fabric();
        let sub = f.create(Domain::Raw, Protocol::Sub).unwrap();
        assert_eq!(f.get_option(sub, SOL_SOCKET, DOMAIN).unwrap(), OptionValue::Int(2));
        assert_eq!(f.get_option(sub, SOL_SOCKET, PROTOCOL).unwrap(), OptionValue::Int(33));
        assert_eq!(
            f.get_option(sub, SOL_SOCKET, 999).unwrap_err().errno(),
            Errno::NoProtocolOption
        );
        assert_eq!(
            f.set_option(sub, SOL_SOCKET, RCVBUF, &OptionValue::Int(0)).unwrap_err().errno(),
            Errno::Invalid
        );
        f.set_option(sub, SUB, SUB_SUBSCRIBE, &OptionValue::from("a")).unwrap();
        f.set_option(sub, SUB, SUB_UNSUBSCRIBE, &OptionValue::from("a")).unwrap();
    }
}
