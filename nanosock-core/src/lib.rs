//! Nanosock Core
//!
//! This crate contains the transport-agnostic building blocks of the
//! nanosock socket runtime:
//! - Protocol variants, domains and the capability table (`protocol`)
//! - Transport capability interface (`transport`)
//! - Readiness poller (`poller`)
//! - Outbound FIFO of would-block writes (`queue`)
//! - Typed socket events (`events`)
//! - Endpoint parsing (`endpoint`)
//! - Socket options and option constants (`options`)
//! - Named constant introspection (`symbols`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_wrap)]

pub mod endpoint;
pub mod error;
pub mod events;
pub mod options;
pub mod poller;
pub mod protocol;
pub mod queue;
pub mod symbols;
pub mod transport;

/// Common imports for transport and runtime crates.
pub mod prelude {
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{Errno, SocketError, TransportError};
    pub use crate::events::{EventBus, EventStream, SocketEvent};
    pub use crate::options::SocketOptions;
    pub use crate::poller::{PollContext, PollToken, Poller};
    pub use crate::protocol::{Capabilities, Domain, Protocol};
    pub use crate::queue::{Completion, OutboundQueue, PendingSend};
    pub use crate::transport::{
        EndpointId, Flags, Interest, OptionValue, RawHandle, SharedTransport, Transport,
    };
}
