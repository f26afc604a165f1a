//! Readiness poller.
//!
//! One registration watches one handle in one direction. While armed, the
//! registration task waits on [`Transport::ready`] and calls back into its
//! owning context every time the handle is ready (level-triggered), yielding
//! to the scheduler between callbacks so one busy handle cannot starve the
//! others sharing the runtime.
//!
//! The context is held weakly and passed explicitly to the callback; nothing
//! is captured implicitly. Disarming flips the token's flag, which the task
//! re-checks after every wakeup, so a disarmed token never fires again even
//! when its readiness wakeup was already in flight.

use crate::transport::{Interest, RawHandle, SharedTransport};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use tracing::{trace, warn};

/// Receiver of readiness callbacks.
pub trait PollContext: 'static {
    /// Called on the runtime thread each time `interest` is ready.
    fn on_ready(&self, interest: Interest);
}

/// Live registration. Dropping the token disarms it.
#[derive(Debug)]
pub struct PollToken {
    id: u64,
    handle: RawHandle,
    interest: Interest,
    armed: Rc<Cell<bool>>,
}

impl PollToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }
}

impl Drop for PollToken {
    fn drop(&mut self) {
        self.armed.set(false);
    }
}

/// Spawns and cancels readiness registrations on the current compio runtime.
#[derive(Clone)]
pub struct Poller {
    transport: SharedTransport,
    next_id: Rc<Cell<u64>>,
}

impl Poller {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            next_id: Rc::new(Cell::new(1)),
        }
    }

    /// Watch `handle` for `interest` and call `ctx.on_ready` while armed.
    ///
    /// Must be called from inside a compio runtime.
    pub fn arm<C: PollContext>(&self, handle: RawHandle, interest: Interest, ctx: &Rc<C>) -> PollToken {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let armed = Rc::new(Cell::new(true));
        let token = PollToken {
            id,
            handle,
            interest,
            armed: armed.clone(),
        };

        trace!(handle = %handle, %interest, id, "[POLL] Armed");
        let transport = self.transport.clone();
        let ctx: Weak<C> = Rc::downgrade(ctx);
        compio::runtime::spawn(watch(transport, handle, interest, ctx, armed, id)).detach();

        token
    }

    /// Cancel a registration.
    pub fn disarm(&self, token: PollToken) {
        trace!(handle = %token.handle, interest = %token.interest, id = token.id, "[POLL] Disarmed");
        drop(token);
    }
}

async fn watch<C: PollContext>(
    transport: SharedTransport,
    handle: RawHandle,
    interest: Interest,
    ctx: Weak<C>,
    armed: Rc<Cell<bool>>,
    id: u64,
) {
    while armed.get() {
        if let Err(e) = transport.ready(handle, interest).await {
            if armed.get() {
                warn!(handle = %handle, %interest, id, "[POLL] Readiness wait failed: {e}");
            }
            break;
        }

        // Disarmed while the wakeup was in flight.
        if !armed.get() {
            break;
        }
        let Some(ctx) = ctx.upgrade() else {
            break;
        };
        ctx.on_ready(interest);
        drop(ctx);

        yield_now().await;
    }
    trace!(handle = %handle, %interest, id, "[POLL] Registration finished");
}

/// Give every other runnable task a turn before continuing.
pub async fn yield_now() {
    YieldNow { yielded: false }.await;
}

struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
