//! Shared helpers for nanosock integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use nanosock::{
    Domain, EndpointId, Errno, Flags, Interest, OptionValue, Protocol, RawHandle, SocketEvent,
    Transport, TransportError,
};
use nanosock::options::{DOMAIN, SOL_SOCKET, SURVEYOR, SURVEYOR_DEADLINE};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

/// Let detached poll tasks run.
pub async fn settle() {
    compio::time::sleep(Duration::from_millis(20)).await;
}

/// Events received so far, without waiting.
pub fn drain(events: &nanosock::EventStream) -> Vec<SocketEvent> {
    events.try_iter().collect()
}

pub fn count(events: &[SocketEvent], pred: impl Fn(&SocketEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

/// Transport whose behaviour is scripted by the test.
///
/// - sends succeed while credits remain (`None` = unlimited), else `EAGAIN`
/// - receives pop the scripted inbound results, `EAGAIN` when empty
#[derive(Default)]
pub struct ScriptedTransport {
    next_handle: Cell<u32>,
    next_endpoint: Cell<u32>,
    domains: RefCell<Vec<(RawHandle, Domain)>>,
    credits: Cell<Option<usize>>,
    fail_next_send: Cell<Option<Errno>>,
    fail_close: Cell<Option<Errno>>,
    inbound: RefCell<VecDeque<Result<Bytes, Errno>>>,
    waiters: RefCell<Vec<(Interest, flume::Sender<()>)>>,
    pub sent: RefCell<Vec<Bytes>>,
    pub closed: RefCell<Vec<RawHandle>>,
    pub shutdowns: RefCell<Vec<EndpointId>>,
    pub options: RefCell<Vec<(i32, i32, OptionValue)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `credits` more sends (`None` = unlimited).
    pub fn set_credits(&self, credits: Option<usize>) {
        self.credits.set(credits);
        self.wake(Interest::Send);
    }

    pub fn fail_next_send(&self, errno: Errno) {
        self.fail_next_send.set(Some(errno));
    }

    pub fn fail_close(&self, errno: Errno) {
        self.fail_close.set(Some(errno));
    }

    pub fn push_inbound(&self, item: Result<Bytes, Errno>) {
        self.inbound.borrow_mut().push_back(item);
        self.wake(Interest::Receive);
    }

    pub fn sent_strings(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.borrow().len()
    }

    fn wake(&self, interest: Interest) {
        let mut waiters = self.waiters.borrow_mut();
        waiters.retain(|(i, tx)| {
            if *i == interest {
                let _ = tx.try_send(());
                false
            } else {
                true
            }
        });
    }

    fn check_open(&self, handle: RawHandle) -> Result<(), TransportError> {
        if self.closed.borrow().contains(&handle) {
            return Err(TransportError::new(Errno::BadDescriptor));
        }
        Ok(())
    }

    fn endpoint(&self, addr: &str) -> Result<EndpointId, TransportError> {
        if !addr.contains("://") {
            return Err(TransportError::with_context(Errno::Invalid, addr));
        }
        let id = self.next_endpoint.get() + 1;
        self.next_endpoint.set(id);
        Ok(EndpointId(id))
    }
}

#[async_trait(?Send)]
impl Transport for ScriptedTransport {
    fn create(&self, domain: Domain, _protocol: Protocol) -> Result<RawHandle, TransportError> {
        let handle = RawHandle(self.next_handle.get() + 1);
        self.next_handle.set(handle.0);
        self.domains.borrow_mut().push((handle, domain));
        Ok(handle)
    }

    fn bind(&self, handle: RawHandle, addr: &str) -> Result<EndpointId, TransportError> {
        self.check_open(handle)?;
        self.endpoint(addr)
    }

    fn connect(&self, handle: RawHandle, addr: &str) -> Result<EndpointId, TransportError> {
        self.check_open(handle)?;
        self.endpoint(addr)
    }

    fn send(&self, handle: RawHandle, payload: &Bytes, _flags: Flags) -> Result<usize, TransportError> {
        self.check_open(handle)?;
        if let Some(errno) = self.fail_next_send.take() {
            return Err(TransportError::new(errno));
        }
        match self.credits.get() {
            Some(0) => return Err(TransportError::new(Errno::Again)),
            Some(n) => self.credits.set(Some(n - 1)),
            None => {}
        }
        self.sent.borrow_mut().push(payload.clone());
        Ok(payload.len())
    }

    fn recv(&self, handle: RawHandle, _flags: Flags) -> Result<Bytes, TransportError> {
        self.check_open(handle)?;
        match self.inbound.borrow_mut().pop_front() {
            Some(Ok(msg)) => Ok(msg),
            Some(Err(errno)) => Err(TransportError::new(errno)),
            None => Err(TransportError::new(Errno::Again)),
        }
    }

    fn shutdown(&self, handle: RawHandle, endpoint: EndpointId) -> Result<(), TransportError> {
        self.check_open(handle)?;
        self.shutdowns.borrow_mut().push(endpoint);
        Ok(())
    }

    fn close(&self, handle: RawHandle) -> Result<(), TransportError> {
        self.check_open(handle)?;
        if let Some(errno) = self.fail_close.take() {
            return Err(TransportError::new(errno));
        }
        self.closed.borrow_mut().push(handle);
        Ok(())
    }

    fn get_option(&self, handle: RawHandle, level: i32, option: i32) -> Result<OptionValue, TransportError> {
        self.check_open(handle)?;
        match (level, option) {
            (SOL_SOCKET, DOMAIN) => {
                let domains = self.domains.borrow();
                let domain = domains
                    .iter()
                    .find(|(h, _)| *h == handle)
                    .map(|(_, d)| *d)
                    .unwrap_or_default();
                Ok(OptionValue::Int(domain.code().into()))
            }
            _ => Err(TransportError::new(Errno::NoProtocolOption)),
        }
    }

    fn set_option(
        &self,
        handle: RawHandle,
        level: i32,
        option: i32,
        value: &OptionValue,
    ) -> Result<(), TransportError> {
        self.check_open(handle)?;
        match (level, option) {
            (SURVEYOR, SURVEYOR_DEADLINE) => {
                self.options.borrow_mut().push((level, option, value.clone()));
                Ok(())
            }
            _ => Err(TransportError::new(Errno::NoProtocolOption)),
        }
    }

    fn is_ready(&self, handle: RawHandle, interest: Interest) -> Result<bool, TransportError> {
        self.check_open(handle)?;
        Ok(match interest {
            Interest::Send => self.credits.get() != Some(0),
            Interest::Receive => !self.inbound.borrow().is_empty(),
        })
    }

    async fn ready(&self, handle: RawHandle, interest: Interest) -> Result<(), TransportError> {
        loop {
            if self.is_ready(handle, interest)? {
                return Ok(());
            }
            let (tx, rx) = flume::bounded(1);
            self.waiters.borrow_mut().push((interest, tx));
            let _ = rx.recv_async().await;
        }
    }

    fn term(&self) {}
}
