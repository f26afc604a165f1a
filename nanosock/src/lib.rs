//! # Nanosock
//!
//! Event-driven, non-blocking scalability-protocol sockets (request/reply,
//! publish/subscribe, pipeline, bus, survey, pair) on a single-threaded
//! `compio` runtime.
//!
//! ## Architecture
//!
//! - **`nanosock-core`**: protocol table, transport capability trait,
//!   readiness poller, outbound queue, typed events, options, error types
//! - **`nanosock-loopback`**: in-process transport collaborator
//! - **`nanosock`**: public API surface (this crate): [`Socket`], [`Reader`],
//!   [`Device`]
//!
//! Writes never wait: a write the transport cannot take right now is queued
//! and retried, in order, when the handle becomes writable. Receiving sockets
//! push inbound messages into their [`Reader`] and emit
//! [`SocketEvent::Message`]; failures arrive as [`SocketEvent::Error`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanosock::{create_socket, SocketOptions};
//!
//! # async fn example() -> nanosock::Result<()> {
//! let rep = create_socket("rep", SocketOptions::default())?;
//! let req = create_socket("req", SocketOptions::default())?;
//! rep.bind("tcp://127.0.0.1:5555")?;
//! req.connect("tcp://127.0.0.1:5555")?;
//!
//! let requests = rep.reader()?;
//! let replies = req.reader()?;
//! req.write("ping")?;
//! if let Some(msg) = requests.recv().await {
//!     rep.write(msg)?;
//! }
//! println!("{:?}", replies.recv().await);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod dev_tracing;
mod device;
mod reader;
mod socket;

pub use bytes::Bytes;
pub use device::{Device, DeviceSocket};
pub use reader::Reader;
pub use socket::{CloseResult, CloseStatus, PayloadHook, ReadOutcome, Socket};

pub use nanosock_core::endpoint::Endpoint;
pub use nanosock_core::error::{strerror, Errno, Result, SocketError, TransportError};
pub use nanosock_core::events::{EventStream, SocketEvent};
pub use nanosock_core::options::{self, SocketOptions};
pub use nanosock_core::protocol::{Domain, Protocol, AF_SP, AF_SP_RAW};
pub use nanosock_core::symbols::{lookup, symbol, symbol_info, SymbolInfo, SymbolNamespace};
pub use nanosock_core::transport::{
    EndpointId, Flags, Interest, OptionValue, RawHandle, SharedTransport, Transport,
};
pub use nanosock_loopback::LoopbackTransport;

use std::rc::Rc;

thread_local! {
    static DEFAULT_TRANSPORT: SharedTransport = Rc::new(LoopbackTransport::shared());
}

/// Transport used by [`Socket::new`] and [`create_socket`] on this thread.
pub fn default_transport() -> SharedTransport {
    DEFAULT_TRANSPORT.with(|transport| transport.clone())
}

/// Create a socket from a type name: `req`, `rep`, `pair`, `push`, `pull`,
/// `pub`, `sub`, `bus`, `surveyor` or `respondent`.
///
/// # Errors
///
/// [`SocketError::InvalidProtocol`] for an unknown name.
pub fn create_socket(name: &str, options: SocketOptions) -> Result<Socket> {
    let protocol: Protocol = name.parse()?;
    Socket::new(protocol, options)
}

/// Start a device over one or two raw sockets.
pub fn create_device(first: &Socket, second: Option<&Socket>) -> Result<Device> {
    match second {
        Some(second) => Device::new(&[first, second]),
        None => Device::new(&[first]),
    }
}

/// Terminate the default transport: pending readiness waits end and every
/// further operation fails with [`Errno::Terminated`].
pub fn term() {
    default_transport().term();
}
