//! Event-driven socket.
//!
//! A [`Socket`] owns one transport handle, its outbound queue and up to two
//! poll registrations. Writes are attempted immediately without waiting; a
//! would-block parks the write in the queue and arms send polling, and the
//! poller later flushes the queue in order. Receiving sockets poll for
//! receive readiness and drain a bounded batch of messages per wakeup into
//! the [`Reader`] channel, pausing when the reader falls behind.
//!
//! All state lives behind one `RefCell` and is only touched from the compio
//! runtime thread. Completion callbacks and payload hooks run after the
//! borrow is released, so they may call back into the socket.

use crate::reader::Reader;
use bytes::Bytes;
use nanosock_core::error::{Errno, Result, SocketError, TransportError};
use nanosock_core::events::{EventBus, EventStream, SocketEvent};
use nanosock_core::options::{SocketOptions, SURVEYOR, SURVEYOR_DEADLINE};
use nanosock_core::poller::{PollContext, PollToken, Poller};
use nanosock_core::protocol::{Domain, Protocol};
use nanosock_core::queue::{Completion, OutboundQueue, PendingSend};
use nanosock_core::transport::{EndpointId, Flags, Interest, OptionValue, RawHandle, SharedTransport};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Payload hook applied on the way out (transform) or in (restore).
pub type PayloadHook = Rc<dyn Fn(Bytes) -> Bytes>;

/// Outcome of a close call.
pub type CloseResult = std::result::Result<CloseStatus, TransportError>;

/// What a successful close did with the transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    /// The handle has been released.
    Released,
    /// Graceful close: the handle is released once the read side has drained.
    Draining,
}

/// How a receive cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The transport had nothing more to deliver.
    Drained,
    /// The reader is full; receive polling was disarmed.
    Paused,
    /// The batch bound was reached with data possibly still pending.
    Budget,
    /// The survey window closed.
    SurveyTimeout,
    /// A hard receive failure stopped the cycle.
    Failed,
}

enum Transmit {
    Sent(Option<Completion>),
    Blocked,
    Failed,
}

enum Step {
    Got(Bytes, Option<PayloadHook>),
    Stop(ReadOutcome),
}

pub(crate) struct SocketCore {
    me: Weak<SocketShared>,
    protocol: Protocol,
    domain: Domain,
    handle: RawHandle,
    transport: SharedTransport,
    poller: Poller,
    options: SocketOptions,
    queue: OutboundQueue,
    send_poll: Option<PollToken>,
    recv_poll: Option<PollToken>,
    closed: bool,
    close_result: Option<CloseResult>,
    released: Option<CloseResult>,
    awaiting_end: bool,
    /// A survey is collecting responses; reader fullness does not pause it.
    surveying: bool,
    endpoint: Option<EndpointId>,
    events: EventBus,
    data_tx: Option<flume::Sender<Bytes>>,
    data_rx: Option<flume::Receiver<Bytes>>,
    transform: Option<PayloadHook>,
    restore: Option<PayloadHook>,
}

impl SocketCore {
    fn poll_slot(&mut self, interest: Interest) -> &mut Option<PollToken> {
        match interest {
            Interest::Send => &mut self.send_poll,
            Interest::Receive => &mut self.recv_poll,
        }
    }

    /// Arm polling for `interest`; no-op when already armed or closed.
    fn arm(&mut self, interest: Interest) {
        if self.closed || self.poll_slot(interest).is_some() {
            return;
        }
        let Some(ctx) = self.me.upgrade() else {
            return;
        };
        let token = self.poller.arm(self.handle, interest, &ctx);
        *self.poll_slot(interest) = Some(token);
    }

    fn disarm(&mut self, interest: Interest) {
        if let Some(token) = self.poll_slot(interest).take() {
            self.poller.disarm(token);
        }
    }

    fn write(&mut self, payload: Bytes, flags: Flags, on_sent: Option<Completion>) -> Result<Option<Completion>> {
        if self.closed {
            trace!(handle = %self.handle, "[SOCKET] Write after close ignored");
            return Ok(None);
        }
        if !self.protocol.can_send() {
            return Err(SocketError::invalid_operation(format!(
                "{} sockets cannot send",
                self.protocol
            )));
        }
        if self.protocol == Protocol::Surveyor {
            self.arm(Interest::Receive);
        }

        let entry = PendingSend::new(payload, flags, on_sent);

        // earlier writes still waiting keep their place in line
        if !self.queue.is_empty() {
            self.queue.push_back(entry);
            self.arm(Interest::Send);
            return Ok(None);
        }

        match self.transmit(entry) {
            Transmit::Sent(done) => Ok(done),
            Transmit::Blocked | Transmit::Failed => Ok(None),
        }
    }

    fn transmit(&mut self, entry: PendingSend) -> Transmit {
        match self
            .transport
            .send(self.handle, &entry.payload, entry.flags | Flags::DONTWAIT)
        {
            Ok(sent) => {
                trace!(handle = %self.handle, sent, "[SOCKET] Sent");
                Transmit::Sent(entry.on_sent)
            }
            Err(e) if e.is_would_block() => {
                trace!(handle = %self.handle, queued = self.queue.len() + 1, "[SOCKET] Send would block, queued");
                self.queue.push_front(entry);
                self.arm(Interest::Send);
                Transmit::Blocked
            }
            Err(e) => {
                debug!(handle = %self.handle, "[SOCKET] Send failed: {e}");
                self.events.emit(SocketEvent::Error(e.into()));
                Transmit::Failed
            }
        }
    }

    fn flush(&mut self) -> Vec<Completion> {
        self.disarm(Interest::Send);

        let mut done = Vec::new();
        while let Some(entry) = self.queue.pop_front() {
            match self.transmit(entry) {
                Transmit::Sent(on_sent) => done.extend(on_sent),
                Transmit::Blocked => break,
                // reported, not retried
                Transmit::Failed => {}
            }
        }
        done
    }

    /// One receive attempt. Ends the cycle on anything but a message.
    fn recv_one(&mut self) -> Step {
        match self.transport.recv(self.handle, Flags::DONTWAIT) {
            Ok(msg) => Step::Got(msg, self.restore.clone()),
            Err(e) if e.is_would_block() => {
                if self.closed {
                    self.end_of_stream();
                }
                Step::Stop(ReadOutcome::Drained)
            }
            Err(e) if self.closed => {
                // nothing more can be read after close
                trace!(handle = %self.handle, "[SOCKET] Receive after close stopped: {e}");
                self.end_of_stream();
                Step::Stop(ReadOutcome::Drained)
            }
            Err(e) if e.errno() == Errno::Fsm && self.protocol == Protocol::Surveyor => {
                debug!(handle = %self.handle, "[SOCKET] Survey window closed");
                self.surveying = false;
                self.disarm(Interest::Send);
                self.disarm(Interest::Receive);
                self.events.emit(SocketEvent::SurveyTimeout);
                Step::Stop(ReadOutcome::SurveyTimeout)
            }
            Err(e) => {
                debug!(handle = %self.handle, "[SOCKET] Receive failed: {e}");
                self.events.emit(SocketEvent::Error(e.into()));
                Step::Stop(ReadOutcome::Failed)
            }
        }
    }

    /// Deliver one received message; `false` when receiving should pause.
    fn deliver(&mut self, msg: Bytes) -> bool {
        trace!(handle = %self.handle, len = msg.len(), "[SOCKET] Received");
        let accepted = self.push(msg.clone());
        self.events.emit(SocketEvent::Message(msg));
        if accepted || self.surveying {
            return true;
        }
        trace!(handle = %self.handle, "[SOCKET] Reader full, pausing");
        self.disarm(Interest::Receive);
        false
    }

    /// Hand a message to the reader; `false` once it holds a full buffer.
    fn push(&mut self, msg: Bytes) -> bool {
        match &self.data_tx {
            Some(tx) => {
                let _ = tx.send(msg);
                tx.len() < self.options.read_high_water_mark
            }
            None => false,
        }
    }

    fn end_of_stream(&mut self) {
        if self.data_tx.take().is_some() {
            debug!(handle = %self.handle, "[SOCKET] End of stream");
            self.events.emit(SocketEvent::End);
        }
        if self.awaiting_end {
            self.awaiting_end = false;
            let _ = self.release();
        }
    }

    /// Give the handle back to the transport, once.
    fn release(&mut self) -> CloseResult {
        if let Some(result) = &self.released {
            return result.clone();
        }
        self.disarm(Interest::Send);
        self.disarm(Interest::Receive);

        let result = self
            .transport
            .close(self.handle)
            .map(|()| CloseStatus::Released);
        if let Err(e) = &result {
            warn!(handle = %self.handle, "[SOCKET] Close failed: {e}");
            self.events.emit(SocketEvent::Error(e.clone().into()));
        }
        debug!(handle = %self.handle, "[SOCKET] Released");
        self.released = Some(result.clone());
        self.events.emit(SocketEvent::Close);
        result
    }

    /// Common first half of both closes; `Some` with the stored result when
    /// the socket was already closed.
    fn begin_close(&mut self) -> Option<CloseResult> {
        if let Some(result) = &self.close_result {
            return Some(result.clone());
        }
        self.surveying = false;
        self.disarm(Interest::Send);
        self.disarm(Interest::Receive);
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!(handle = %self.handle, dropped, "[SOCKET] Discarding queued writes");
        }
        None
    }

    fn close(&mut self) -> CloseResult {
        if let Some(result) = self.begin_close() {
            return result;
        }
        self.closed = true;
        self.data_tx = None;
        let result = self.release();
        self.close_result = Some(result.clone());
        result
    }

    /// Shut down the endpoint and mark the socket closed. Returns the drain
    /// limit, or `None` when there is no read side to drain.
    fn start_graceful(&mut self) -> Option<usize> {
        if let Some(endpoint) = self.endpoint {
            if let Err(e) = self.transport.shutdown(self.handle, endpoint) {
                debug!(handle = %self.handle, %endpoint, "[SOCKET] Shutdown during close failed: {e}");
            }
        }
        self.closed = true;
        if !self.protocol.can_receive() {
            return None;
        }
        self.awaiting_end = true;
        // later close calls see this until the drain settles the result
        self.close_result = Some(Ok(CloseStatus::Draining));
        Some(self.options.graceful_drain)
    }

    /// Reader asked for more data. Returns a batch to read directly when
    /// the socket is closed and no longer polls.
    fn request_more(&mut self) -> Option<usize> {
        let tx = self.data_tx.as_ref()?;
        if tx.len() >= self.options.read_high_water_mark {
            return None;
        }
        if !self.closed {
            self.arm(Interest::Receive);
            None
        } else if self.released.is_none() {
            Some(self.options.recv_batch)
        } else {
            None
        }
    }

    fn report<T>(&mut self, result: std::result::Result<T, TransportError>) -> Result<T> {
        result.map_err(|e| {
            let err = SocketError::from(e);
            self.events.emit(SocketEvent::Error(err.clone()));
            err
        })
    }
}

pub(crate) struct SocketShared {
    core: RefCell<SocketCore>,
}

impl SocketShared {
    fn flush(&self) {
        let done = self.core.borrow_mut().flush();
        for on_sent in done {
            on_sent();
        }
    }

    /// At most `max_batch` receive attempts. The restore hook runs between
    /// borrows.
    fn receive(&self, max_batch: usize) -> ReadOutcome {
        for _ in 0..max_batch {
            let step = self.core.borrow_mut().recv_one();
            let msg = match step {
                Step::Got(msg, Some(restore)) => restore(msg),
                Step::Got(msg, None) => msg,
                Step::Stop(outcome) => return outcome,
            };
            if !self.core.borrow_mut().deliver(msg) {
                return ReadOutcome::Paused;
            }
        }
        ReadOutcome::Budget
    }

    pub(crate) fn request_more(&self) {
        let direct = self.core.borrow_mut().request_more();
        if let Some(batch) = direct {
            self.receive(batch);
        }
    }

    fn close_graceful(&self) -> CloseResult {
        let limit = {
            let mut core = self.core.borrow_mut();
            if let Some(result) = core.begin_close() {
                return result;
            }
            match core.start_graceful() {
                Some(limit) => limit,
                None => {
                    let result = core.release();
                    core.close_result = Some(result.clone());
                    return result;
                }
            }
        };

        let outcome = self.receive(limit);
        let mut core = self.core.borrow_mut();
        trace!(handle = %core.handle, ?outcome, "[SOCKET] Graceful drain");
        let result = match &core.released {
            Some(result) => result.clone(),
            None => Ok(CloseStatus::Draining),
        };
        core.close_result = Some(result.clone());
        result
    }
}

impl PollContext for SocketShared {
    fn on_ready(&self, interest: Interest) {
        match interest {
            Interest::Send => self.flush(),
            Interest::Receive => {
                let batch = self.core.borrow().options.recv_batch;
                self.receive(batch);
            }
        }
    }
}

impl Drop for SocketShared {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if core.released.is_none() {
            debug!(handle = %core.handle, "[SOCKET] Dropped without close, releasing");
            core.send_poll = None;
            core.recv_poll = None;
            let _ = core.transport.close(core.handle);
        }
    }
}

/// A scalability-protocol socket on the current compio runtime.
///
/// ## Example
///
/// ```rust,no_run
/// use nanosock::{Protocol, Socket, SocketOptions};
///
/// # async fn example() -> nanosock::Result<()> {
/// let publisher = Socket::new(Protocol::Pub, SocketOptions::default())?;
/// let subscriber = Socket::new(Protocol::Sub, SocketOptions::default())?;
/// publisher.bind("inproc://news")?;
/// subscriber.connect("inproc://news")?;
///
/// let reader = subscriber.reader()?;
/// publisher.write("hello")?;
/// assert_eq!(reader.recv().await.as_deref(), Some(&b"hello"[..]));
/// # Ok(())
/// # }
/// ```
pub struct Socket {
    shared: Rc<SocketShared>,
}

impl Socket {
    /// Create a socket on the default in-process transport.
    pub fn new(protocol: Protocol, options: SocketOptions) -> Result<Self> {
        Self::with_transport(crate::default_transport(), protocol, options)
    }

    /// Create a socket from a numeric domain and a type name
    /// (`"req"`, `"pub"`, ...).
    pub fn with_domain(domain: i32, name: &str) -> Result<Self> {
        let domain = Domain::from_code(domain)?;
        let protocol: Protocol = name.parse()?;
        Self::new(protocol, SocketOptions::default().with_raw(domain.is_raw()))
    }

    /// Create a socket on an explicit transport.
    ///
    /// Normal-domain sockets that can receive start polling for inbound
    /// messages immediately.
    pub fn with_transport(transport: SharedTransport, protocol: Protocol, options: SocketOptions) -> Result<Self> {
        let domain = options.domain();
        let handle = transport.create(domain, protocol)?;

        if let (Protocol::Surveyor, Some(deadline)) = (protocol, options.survey_deadline) {
            let ms = OptionValue::Int(i64::try_from(deadline.as_millis()).unwrap_or(i64::MAX));
            if let Err(e) = transport.set_option(handle, SURVEYOR, SURVEYOR_DEADLINE, &ms) {
                let _ = transport.close(handle);
                return Err(e.into());
            }
        }

        let (data_tx, data_rx) = if protocol.can_receive() {
            let (tx, rx) = flume::unbounded();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let shared = Rc::new_cyclic(|me| SocketShared {
            core: RefCell::new(SocketCore {
                me: me.clone(),
                protocol,
                domain,
                handle,
                poller: Poller::new(transport.clone()),
                transport,
                options,
                queue: OutboundQueue::new(),
                send_poll: None,
                recv_poll: None,
                closed: false,
                close_result: None,
                released: None,
                awaiting_end: false,
                surveying: false,
                endpoint: None,
                events: EventBus::new(),
                data_tx,
                data_rx,
                transform: None,
                restore: None,
            }),
        });

        if !domain.is_raw() && protocol.can_receive() {
            shared.core.borrow_mut().arm(Interest::Receive);
        }
        debug!(handle = %handle, %protocol, ?domain, "[SOCKET] Created");
        Ok(Self { shared })
    }

    /// Protocol variant.
    pub fn protocol(&self) -> Protocol {
        self.shared.core.borrow().protocol
    }

    /// Normal or raw.
    pub fn domain(&self) -> Domain {
        self.shared.core.borrow().domain
    }

    /// Whether the protocol may send.
    pub fn can_send(&self) -> bool {
        self.protocol().can_send()
    }

    /// Whether the protocol may receive.
    pub fn can_receive(&self) -> bool {
        self.protocol().can_receive()
    }

    /// Transport handle owned by this socket.
    pub fn handle(&self) -> RawHandle {
        self.shared.core.borrow().handle
    }

    pub(crate) fn transport(&self) -> SharedTransport {
        self.shared.core.borrow().transport.clone()
    }

    /// Set by the first close call and never cleared.
    pub fn is_closed(&self) -> bool {
        self.shared.core.borrow().closed
    }

    /// Writes waiting for send readiness.
    pub fn queued(&self) -> usize {
        self.shared.core.borrow().queue.len()
    }

    /// Whether a poll registration for `interest` is active.
    pub fn is_polling(&self, interest: Interest) -> bool {
        let core = self.shared.core.borrow();
        match interest {
            Interest::Send => core.send_poll.is_some(),
            Interest::Receive => core.recv_poll.is_some(),
        }
    }

    /// Endpoint of the most recent successful bind or connect.
    pub fn endpoint(&self) -> Option<EndpointId> {
        self.shared.core.borrow().endpoint
    }

    /// Subscribe to this socket's events.
    pub fn events(&self) -> EventStream {
        self.shared.core.borrow_mut().events.subscribe()
    }

    /// Bind to a local address. Failures are also emitted as an error event.
    pub fn bind(&self, addr: &str) -> Result<EndpointId> {
        let mut core = self.shared.core.borrow_mut();
        let result = core.transport.bind(core.handle, addr);
        let id = core.report(result)?;
        debug!(handle = %core.handle, addr, endpoint = %id, "[SOCKET] Bound");
        core.endpoint = Some(id);
        Ok(id)
    }

    /// Connect to a remote address. Failures are also emitted as an error event.
    pub fn connect(&self, addr: &str) -> Result<EndpointId> {
        let mut core = self.shared.core.borrow_mut();
        let result = core.transport.connect(core.handle, addr);
        let id = core.report(result)?;
        debug!(handle = %core.handle, addr, endpoint = %id, "[SOCKET] Connected");
        core.endpoint = Some(id);
        Ok(id)
    }

    /// Shut down one endpoint. Failures are also emitted as an error event.
    pub fn shutdown(&self, endpoint: EndpointId) -> Result<()> {
        let mut core = self.shared.core.borrow_mut();
        let result = core.transport.shutdown(core.handle, endpoint);
        core.report(result)?;
        if core.endpoint == Some(endpoint) {
            core.endpoint = None;
        }
        Ok(())
    }

    /// Write a message with default flags.
    pub fn write(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.write_inner(payload.into(), Flags::NONE, None)
    }

    /// Write a message with explicit flags.
    pub fn write_flags(&self, payload: impl Into<Bytes>, flags: Flags) -> Result<()> {
        self.write_inner(payload.into(), flags, None)
    }

    /// Write a message and run `on_sent` once the transport accepted it.
    ///
    /// A write that fails with a hard error never completes; the failure is
    /// emitted as an error event instead.
    pub fn write_then<F>(&self, payload: impl Into<Bytes>, flags: Flags, on_sent: F) -> Result<()>
    where
        F: FnOnce() + 'static,
    {
        self.write_inner(payload.into(), flags, Some(Box::new(on_sent)))
    }

    /// Fire-and-forget write returning the payload length.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<usize> {
        let payload = payload.into();
        let len = payload.len();
        self.write_inner(payload, Flags::NONE, None)?;
        Ok(len)
    }

    fn write_inner(&self, payload: Bytes, flags: Flags, on_sent: Option<Completion>) -> Result<()> {
        let transform = {
            let core = self.shared.core.borrow();
            if core.closed || !core.protocol.can_send() {
                None
            } else {
                core.transform.clone()
            }
        };
        let payload = match transform {
            Some(transform) => transform(payload),
            None => payload,
        };
        let done = self.shared.core.borrow_mut().write(payload, flags, on_sent)?;
        if let Some(on_sent) = done {
            on_sent();
        }
        Ok(())
    }

    /// Retry queued writes in order until the queue empties or the
    /// transport would block again.
    pub fn flush(&self) {
        self.shared.flush();
    }

    /// Run one receive cycle of at most `max_batch` attempts.
    pub fn receive(&self, max_batch: usize) -> ReadOutcome {
        self.shared.receive(max_batch)
    }

    /// Pull side of the socket's data channel.
    pub fn reader(&self) -> Result<Reader> {
        let core = self.shared.core.borrow();
        let rx = core.data_rx.clone().ok_or_else(|| {
            SocketError::invalid_operation(format!("{} sockets cannot receive", core.protocol))
        })?;
        Ok(Reader::new(
            Rc::downgrade(&self.shared),
            rx,
            core.options.read_high_water_mark,
        ))
    }

    /// Close immediately: stop polling and release the handle.
    ///
    /// Repeated calls return the first result without side effects.
    pub fn close(&self) -> CloseResult {
        self.shared.core.borrow_mut().close()
    }

    /// Close gracefully: shut down the current endpoint, drain what is already
    /// buffered and release the handle once the read side reaches its end.
    pub fn close_graceful(&self) -> CloseResult {
        self.shared.close_graceful()
    }

    /// Read a socket option. Failures are also emitted as an error event.
    pub fn get_option(&self, level: i32, option: i32) -> Result<OptionValue> {
        let mut core = self.shared.core.borrow_mut();
        let result = core.transport.get_option(core.handle, level, option);
        core.report(result)
    }

    /// Set a socket option. Failures are also emitted as an error event.
    pub fn set_option(&self, level: i32, option: i32, value: impl Into<OptionValue>) -> Result<()> {
        let value = value.into();
        let mut core = self.shared.core.borrow_mut();
        let result = core.transport.set_option(core.handle, level, option, &value);
        core.report(result)
    }

    /// Apply `transform` to every outgoing payload before transmission.
    pub fn set_transform<F>(&self, transform: F)
    where
        F: Fn(Bytes) -> Bytes + 'static,
    {
        self.shared.core.borrow_mut().transform = Some(Rc::new(transform));
    }

    /// Apply `restore` to every received payload before delivery.
    pub fn set_restore<F>(&self, restore: F)
    where
        F: Fn(Bytes) -> Bytes + 'static,
    {
        self.shared.core.borrow_mut().restore = Some(Rc::new(restore));
    }

    /// Send a survey and collect every response until the window closes.
    pub async fn survey(&self, payload: impl Into<Bytes>) -> Result<Vec<Bytes>> {
        let events = self.begin_survey(payload.into())?;
        Ok(collect_responses(events).await)
    }

    /// Callback form of [`survey`](Self::survey): `callback` receives the
    /// responses once the window closes.
    pub fn survey_with<F>(&self, payload: impl Into<Bytes>, callback: F) -> Result<()>
    where
        F: FnOnce(Vec<Bytes>) + 'static,
    {
        let events = self.begin_survey(payload.into())?;
        compio::runtime::spawn(async move {
            callback(collect_responses(events).await);
        })
        .detach();
        Ok(())
    }

    fn begin_survey(&self, payload: Bytes) -> Result<EventStream> {
        {
            let mut core = self.shared.core.borrow_mut();
            if core.protocol != Protocol::Surveyor {
                return Err(SocketError::invalid_operation(format!(
                    "survey() needs a SURVEYOR socket, not {}",
                    core.protocol
                )));
            }
            if core.closed {
                return Err(SocketError::invalid_operation("survey() on a closed socket"));
            }
            core.surveying = true;
        }
        // listen before sending so no response can slip past
        let events = self.events();
        self.write(payload)?;
        Ok(events)
    }
}

async fn collect_responses(events: EventStream) -> Vec<Bytes> {
    let mut responses = Vec::new();
    while let Ok(event) = events.recv_async().await {
        match event {
            SocketEvent::Message(msg) => responses.push(msg),
            SocketEvent::SurveyTimeout | SocketEvent::Close => break,
            SocketEvent::Error(_) | SocketEvent::End => {}
        }
    }
    responses
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.borrow();
        f.debug_struct("Socket")
            .field("handle", &core.handle)
            .field("protocol", &core.protocol)
            .field("domain", &core.domain)
            .field("closed", &core.closed)
            .field("queued", &core.queue.len())
            .finish()
    }
}
