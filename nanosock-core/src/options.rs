//! Socket configuration options
//!
//! Two kinds of knobs live here:
//!
//! - [`SocketOptions`]: runtime behaviour of a nanosock socket (domain,
//!   receive batch bound, read buffer high water mark, graceful drain).
//! - Numeric `(level, option)` constants passed through
//!   `get_option` / `set_option` to the transport.

use crate::protocol::{Domain, Protocol};
use std::time::Duration;

/// Generic socket-level options.
pub const SOL_SOCKET: i32 = 0;

/// Linger period in milliseconds.
pub const LINGER: i32 = 1;
/// Outbound buffer size.
pub const SNDBUF: i32 = 2;
/// Inbound buffer size.
pub const RCVBUF: i32 = 3;
/// Send timeout in milliseconds.
pub const SNDTIMEO: i32 = 4;
/// Receive timeout in milliseconds.
pub const RCVTIMEO: i32 = 5;
/// Reconnect interval in milliseconds.
pub const RECONNECT_IVL: i32 = 6;
/// Maximum reconnect interval in milliseconds.
pub const RECONNECT_IVL_MAX: i32 = 7;
/// Socket domain code (read-only).
pub const DOMAIN: i32 = 12;
/// Socket protocol code (read-only).
pub const PROTOCOL: i32 = 13;
/// Human readable socket name.
pub const SOCKET_NAME: i32 = 15;

/// Option level of SUB sockets.
pub const SUB: i32 = Protocol::Sub.code();
/// Add a subscription prefix.
pub const SUB_SUBSCRIBE: i32 = 1;
/// Remove a subscription prefix.
pub const SUB_UNSUBSCRIBE: i32 = 2;

/// Option level of SURVEYOR sockets.
pub const SURVEYOR: i32 = Protocol::Surveyor.code();
/// Survey window in milliseconds.
pub const SURVEYOR_DEADLINE: i32 = 1;

/// Option level of REQ sockets.
pub const REQ: i32 = Protocol::Req.code();
/// Request resend interval in milliseconds.
pub const REQ_RESEND_IVL: i32 = 1;

/// Default number of receive attempts per readiness callback.
pub const DEFAULT_RECV_BATCH: usize = 5;

/// Default number of buffered inbound messages before the socket pauses.
pub const DEFAULT_READ_HWM: usize = 16;

/// Default number of messages drained by a graceful close.
pub const DEFAULT_GRACEFUL_DRAIN: usize = 100;

/// Runtime options of a socket.
///
/// # Examples
///
/// ```
/// use nanosock_core::options::SocketOptions;
///
/// let opts = SocketOptions::new()
///     .with_raw(true)
///     .with_recv_batch(10);
/// assert!(opts.domain().is_raw());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Raw domain: no protocol state machine, no automatic receive polling.
    pub raw: bool,

    /// Receive attempts per readiness callback.
    ///
    /// Bounds how long one busy socket can hold the runtime before the
    /// others sharing it get a turn.
    pub recv_batch: usize,

    /// Buffered inbound messages at which the socket stops polling until
    /// the consumer asks for more.
    pub read_high_water_mark: usize,

    /// Inbound messages drained by a graceful close.
    pub graceful_drain: usize,

    /// Survey window applied at construction through
    /// [`SURVEYOR_DEADLINE`], when set.
    pub survey_deadline: Option<Duration>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            raw: false,
            recv_batch: DEFAULT_RECV_BATCH,
            read_high_water_mark: DEFAULT_READ_HWM,
            graceful_drain: DEFAULT_GRACEFUL_DRAIN,
            survey_deadline: None,
        }
    }
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Set the receive batch bound (minimum 1).
    pub fn with_recv_batch(mut self, batch: usize) -> Self {
        self.recv_batch = batch.max(1);
        self
    }

    /// Set the read high water mark (minimum 1).
    pub fn with_read_high_water_mark(mut self, hwm: usize) -> Self {
        self.read_high_water_mark = hwm.max(1);
        self
    }

    pub fn with_graceful_drain(mut self, limit: usize) -> Self {
        self.graceful_drain = limit;
        self
    }

    pub fn with_survey_deadline(mut self, deadline: Duration) -> Self {
        self.survey_deadline = Some(deadline);
        self
    }

    pub fn domain(&self) -> Domain {
        if self.raw {
            Domain::Raw
        } else {
            Domain::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SocketOptions::default();
        assert!(!opts.raw);
        assert_eq!(opts.recv_batch, 5);
        assert_eq!(opts.read_high_water_mark, 16);
        assert_eq!(opts.graceful_drain, 100);
        assert_eq!(opts.survey_deadline, None);
        assert_eq!(opts.domain(), Domain::Normal);
    }

    #[test]
    fn test_builder_clamps_zero() {
        let opts = SocketOptions::new()
            .with_recv_batch(0)
            .with_read_high_water_mark(0);
        assert_eq!(opts.recv_batch, 1);
        assert_eq!(opts.read_high_water_mark, 1);
    }

    #[test]
    fn test_protocol_levels() {
        assert_eq!(SUB, 33);
        assert_eq!(SURVEYOR, 98);
        assert_eq!(REQ, 48);
    }
}
