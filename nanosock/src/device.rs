//! Forwarding device.
//!
//! Relays every message between two raw sockets (or from one raw socket
//! back to itself) until the first failure. The device borrows the
//! sockets' handles and never closes them.

use crate::socket::Socket;
use bytes::Bytes;
use futures::{select, FutureExt};
use nanosock_core::error::{Errno, Result, SocketError, TransportError};
use nanosock_core::events::{EventBus, EventStream, SocketEvent};
use nanosock_core::options::{DOMAIN, SOL_SOCKET};
use nanosock_core::protocol::AF_SP_RAW;
use nanosock_core::transport::{Flags, Interest, OptionValue, RawHandle, SharedTransport, Transport};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// What a device needs from a socket-like argument.
pub trait DeviceSocket {
    /// Handle to forward on.
    fn handle(&self) -> RawHandle;

    /// Transport the handle belongs to.
    fn transport(&self) -> SharedTransport;

    /// Closed sockets are rejected.
    fn is_closed(&self) -> bool;
}

impl DeviceSocket for Socket {
    fn handle(&self) -> RawHandle {
        Socket::handle(self)
    }

    fn transport(&self) -> SharedTransport {
        Socket::transport(self)
    }

    fn is_closed(&self) -> bool {
        Socket::is_closed(self)
    }
}

struct DeviceState {
    running: Cell<bool>,
    events: RefCell<EventBus>,
}

/// A running forwarding loop.
///
/// ```rust,no_run
/// use nanosock::{Device, Protocol, Socket, SocketOptions};
///
/// # fn example() -> nanosock::Result<()> {
/// let raw = SocketOptions::new().with_raw(true);
/// let frontend = Socket::new(Protocol::Pull, raw.clone())?;
/// let backend = Socket::new(Protocol::Push, raw)?;
/// frontend.bind("inproc://jobs-in")?;
/// backend.bind("inproc://jobs-out")?;
///
/// let device = Device::new(&[&frontend, &backend])?;
/// let errors = device.events();
/// # drop(errors);
/// # Ok(())
/// # }
/// ```
pub struct Device {
    state: Rc<DeviceState>,
}

impl Device {
    /// Start forwarding between one or two sockets.
    ///
    /// Fails with `InvalidArgument` unless given one or two open sockets on
    /// the same transport. Must be called inside a compio runtime.
    pub fn new(sockets: &[&dyn DeviceSocket]) -> Result<Self> {
        let (first, second) = match sockets {
            [a] => (*a, None),
            [a, b] => (*a, Some(*b)),
            _ => {
                return Err(SocketError::invalid_argument(format!(
                    "a device takes one or two sockets, got {}",
                    sockets.len()
                )))
            }
        };

        if sockets.iter().any(|s| s.is_closed()) {
            return Err(SocketError::invalid_argument("device socket is closed"));
        }
        let transport = first.transport();
        if let Some(second) = second {
            if !same_transport(&transport, &second.transport()) {
                return Err(SocketError::invalid_argument(
                    "device sockets must share a transport",
                ));
            }
        }

        let a = first.handle();
        let b = second.map_or(a, |s| s.handle());
        let state = Rc::new(DeviceState {
            running: Cell::new(true),
            events: RefCell::new(EventBus::new()),
        });

        debug!(a = %a, b = %b, "[DEVICE] Starting");
        compio::runtime::spawn(forward(transport, a, b, state.clone())).detach();
        Ok(Self { state })
    }

    /// Subscribe to the device's error events.
    pub fn events(&self) -> EventStream {
        self.state.events.borrow_mut().subscribe()
    }

    /// `false` once forwarding stopped on an error.
    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("running", &self.state.running.get())
            .finish()
    }
}

fn same_transport(a: &SharedTransport, b: &SharedTransport) -> bool {
    std::ptr::eq(
        Rc::as_ptr(a).cast::<()>(),
        Rc::as_ptr(b).cast::<()>(),
    )
}

async fn forward(transport: SharedTransport, a: RawHandle, b: RawHandle, state: Rc<DeviceState>) {
    let result = run(&*transport, a, b).await;
    state.running.set(false);
    if let Err(e) = result {
        warn!(a = %a, b = %b, "[DEVICE] Forwarding stopped: {e}");
        state.events.borrow_mut().emit(SocketEvent::Error(e));
    }
}

async fn run(transport: &dyn Transport, a: RawHandle, b: RawHandle) -> Result<()> {
    ensure_raw(transport, a)?;
    if b != a {
        ensure_raw(transport, b)?;
    }

    loop {
        if a == b {
            transport.ready(a, Interest::Receive).await?;
            relay(transport, a, a).await?;
            continue;
        }

        let (from, to) = select! {
            r = transport.ready(a, Interest::Receive).fuse() => r.map(|()| (a, b))?,
            r = transport.ready(b, Interest::Receive).fuse() => r.map(|()| (b, a))?,
        };
        relay(transport, from, to).await?;
    }
}

/// Devices only work on raw sockets, which carry no protocol state machine.
fn ensure_raw(transport: &dyn Transport, handle: RawHandle) -> Result<()> {
    match transport.get_option(handle, SOL_SOCKET, DOMAIN)? {
        OptionValue::Int(domain) if domain == i64::from(AF_SP_RAW) => Ok(()),
        _ => Err(TransportError::with_context(Errno::Invalid, format!("{handle} is not a raw socket")).into()),
    }
}

async fn relay(transport: &dyn Transport, from: RawHandle, to: RawHandle) -> Result<()> {
    let msg: Bytes = match transport.recv(from, Flags::DONTWAIT) {
        Ok(msg) => msg,
        Err(e) if e.is_would_block() => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    loop {
        match transport.send(to, &msg, Flags::DONTWAIT) {
            Ok(_) => {
                trace!(from = %from, to = %to, len = msg.len(), "[DEVICE] Forwarded");
                return Ok(());
            }
            Err(e) if e.is_would_block() => transport.ready(to, Interest::Send).await?,
            Err(e) => return Err(e.into()),
        }
    }
}
