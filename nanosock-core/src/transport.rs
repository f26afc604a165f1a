//! Transport capability interface.
//!
//! The runtime never speaks a wire protocol itself. Everything it needs from
//! the layer below is this small capability set: create a handle, bind or
//! connect it, move bytes without blocking, query readiness, and tear down.
//! A transport reports "would block" as [`Errno::Again`](crate::error::Errno),
//! distinct from hard failures.
//!
//! Error codes are carried by every returned [`TransportError`], so there is
//! no process-wide "last error" to consult.

use crate::error::TransportError;
use crate::protocol::{Domain, Protocol};
use bytes::Bytes;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

/// Transport-owned socket handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub u32);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one bound or connected endpoint of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

/// Send / receive flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);

    /// Never wait; report would-block instead.
    pub const DONTWAIT: Flags = Flags(1);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Self) -> Self::Output {
        Flags(self.0 | rhs.0)
    }
}

/// Readiness direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Send,
    Receive,
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

/// Socket option value: options are either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

impl OptionValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Str(s) => Some(s),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Capabilities the socket runtime consumes from the transport layer.
///
/// All calls are non-blocking except [`Transport::ready`], which is the only
/// suspension point: it resolves once the handle may be ready in the given
/// direction (spurious wakeups are allowed; callers re-check).
///
/// Designed for single-threaded runtimes like compio, so neither the trait
/// nor its futures require `Send`.
#[async_trait::async_trait(?Send)]
pub trait Transport {
    /// Allocate a handle.
    fn create(&self, domain: Domain, protocol: Protocol) -> Result<RawHandle, TransportError>;

    /// Bind the handle to a local address.
    fn bind(&self, handle: RawHandle, addr: &str) -> Result<EndpointId, TransportError>;

    /// Connect the handle to a remote address.
    fn connect(&self, handle: RawHandle, addr: &str) -> Result<EndpointId, TransportError>;

    /// Send one message; returns the number of bytes accepted.
    fn send(&self, handle: RawHandle, payload: &Bytes, flags: Flags)
        -> Result<usize, TransportError>;

    /// Receive one message.
    fn recv(&self, handle: RawHandle, flags: Flags) -> Result<Bytes, TransportError>;

    /// Remove one endpoint from the handle.
    fn shutdown(&self, handle: RawHandle, endpoint: EndpointId) -> Result<(), TransportError>;

    /// Release the handle.
    fn close(&self, handle: RawHandle) -> Result<(), TransportError>;

    fn get_option(
        &self,
        handle: RawHandle,
        level: i32,
        option: i32,
    ) -> Result<OptionValue, TransportError>;

    fn set_option(
        &self,
        handle: RawHandle,
        level: i32,
        option: i32,
        value: &OptionValue,
    ) -> Result<(), TransportError>;

    /// Level-triggered readiness check.
    fn is_ready(&self, handle: RawHandle, interest: Interest) -> Result<bool, TransportError>;

    /// Wait until the handle may be ready in `interest` direction.
    ///
    /// # Errors
    ///
    /// Fails once the handle is closed or the library terminated.
    async fn ready(&self, handle: RawHandle, interest: Interest) -> Result<(), TransportError>;

    /// Terminate the library: every later call fails with `ETERM`.
    fn term(&self);
}

/// Transport shared by every socket of one runtime.
pub type SharedTransport = Rc<dyn Transport>;
