//! In-process transport collaborator for nanosock.
//!
//! Implements the [`Transport`] capability interface without any OS sockets:
//! every address (`tcp://`, `ipc://`, `inproc://`) is a name in a fabric
//! registry, and linked sockets exchange [`Bytes`] through bounded inboxes.
//! Protocol rules (publish fan-out with prefix subscriptions, round-robin
//! push, request/reply and survey state machines) are enforced here, and
//! every operation is non-blocking: a full peer or empty inbox is `EAGAIN`.
//!
//! ```rust,no_run
//! use nanosock_core::prelude::*;
//! use nanosock_loopback::LoopbackTransport;
//! use bytes::Bytes;
//!
//! let transport = LoopbackTransport::new();
//! let push = transport.create(Domain::Normal, Protocol::Push).unwrap();
//! let pull = transport.create(Domain::Normal, Protocol::Pull).unwrap();
//! transport.bind(pull, "inproc://jobs").unwrap();
//! transport.connect(push, "inproc://jobs").unwrap();
//! transport.send(push, &Bytes::from_static(b"job"), Flags::DONTWAIT).unwrap();
//! assert_eq!(transport.recv(pull, Flags::DONTWAIT).unwrap(), "job");
//! ```

mod fabric;
mod state;

pub use state::{DEFAULT_BUFFER, DEFAULT_SURVEY_DEADLINE};

use async_trait::async_trait;
use bytes::Bytes;
use fabric::Fabric;
use nanosock_core::error::TransportError;
use nanosock_core::protocol::{Domain, Protocol};
use nanosock_core::transport::{EndpointId, Flags, Interest, OptionValue, RawHandle, Transport};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Instant;

/// Process-wide fabric behind [`LoopbackTransport::shared`].
static GLOBAL_FABRIC: Lazy<Arc<Fabric>> = Lazy::new(|| Arc::new(Fabric::default()));

/// Handle to a loopback fabric. Clones share the fabric.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    fabric: Arc<Fabric>,
}

impl LoopbackTransport {
    /// A fresh, isolated fabric.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide fabric.
    pub fn shared() -> Self {
        Self {
            fabric: GLOBAL_FABRIC.clone(),
        }
    }

    /// Number of open handles.
    pub fn socket_count(&self) -> usize {
        self.fabric.socket_count()
    }

    /// Canonical addresses currently bound.
    pub fn bound_addresses(&self) -> Vec<String> {
        self.fabric.bound_addresses()
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("sockets", &self.fabric.socket_count())
            .finish()
    }
}

#[async_trait(?Send)]
impl Transport for LoopbackTransport {
    fn create(&self, domain: Domain, protocol: Protocol) -> Result<RawHandle, TransportError> {
        self.fabric.create(domain, protocol)
    }

    fn bind(&self, handle: RawHandle, addr: &str) -> Result<EndpointId, TransportError> {
        self.fabric.bind(handle, addr)
    }

    fn connect(&self, handle: RawHandle, addr: &str) -> Result<EndpointId, TransportError> {
        self.fabric.connect(handle, addr)
    }

    fn send(&self, handle: RawHandle, payload: &Bytes, _flags: Flags) -> Result<usize, TransportError> {
        self.fabric.send(handle, payload)
    }

    fn recv(&self, handle: RawHandle, _flags: Flags) -> Result<Bytes, TransportError> {
        self.fabric.recv(handle)
    }

    fn shutdown(&self, handle: RawHandle, endpoint: EndpointId) -> Result<(), TransportError> {
        self.fabric.shutdown(handle, endpoint)
    }

    fn close(&self, handle: RawHandle) -> Result<(), TransportError> {
        self.fabric.close(handle)
    }

    fn get_option(&self, handle: RawHandle, level: i32, option: i32) -> Result<OptionValue, TransportError> {
        self.fabric.get_option(handle, level, option)
    }

    fn set_option(
        &self,
        handle: RawHandle,
        level: i32,
        option: i32,
        value: &OptionValue,
    ) -> Result<(), TransportError> {
        self.fabric.set_option(handle, level, option, value)
    }

    fn is_ready(&self, handle: RawHandle, interest: Interest) -> Result<bool, TransportError> {
        self.fabric.is_ready(handle, interest)
    }

    async fn ready(&self, handle: RawHandle, interest: Interest) -> Result<(), TransportError> {
        loop {
            if self.fabric.is_ready(handle, interest)? {
                return Ok(());
            }
            let (wakeup, deadline) = self.fabric.register(handle, interest)?;
            // re-check after registering so a wake in between is not lost
            if self.fabric.is_ready(handle, interest)? {
                return Ok(());
            }

            match deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    let _ = compio::time::timeout(wait, wakeup.recv_async()).await;
                }
                None => {
                    let _ = wakeup.recv_async().await;
                }
            }
        }
    }

    fn term(&self) {
        self.fabric.term();
    }
}
