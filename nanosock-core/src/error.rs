/// Nanosock Error Types
///
/// Two layers: [`TransportError`] is what the transport collaborator reports
/// (an [`Errno`] plus its description), [`SocketError`] is the public taxonomy
/// surfaced by sockets and devices, either synchronously or through the
/// event channel.
use std::fmt;
use thiserror::Error;

/// Error codes reported by a transport collaborator.
///
/// Numeric values follow the POSIX codes a scalability-protocol library
/// reports, with the two library-specific codes (`ETERM`, `EFSM`) placed in
/// the library's private range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    /// `EAGAIN`: the operation would block.
    Again,
    /// `EBADF`: the handle is not (or no longer) valid.
    BadDescriptor,
    /// `EINVAL`: an argument was rejected.
    Invalid,
    /// `ENOTSUP`: the operation is not supported by this protocol.
    NotSupported,
    /// `ENOPROTOOPT`: unknown option level / key.
    NoProtocolOption,
    /// `EADDRINUSE`: the address is already bound.
    AddrInUse,
    /// `EAFNOSUPPORT`: unknown socket domain.
    DomainNotSupported,
    /// `EPROTONOSUPPORT`: unknown protocol.
    ProtocolNotSupported,
    /// `ETERM`: the library was terminated.
    Terminated,
    /// `EFSM`: the operation cannot be performed in the current protocol state.
    Fsm,
    /// Any other code.
    Other(i32),
}

const HAUSNUMERO: i32 = 156_384_712;

impl Errno {
    /// Numeric code of this error.
    pub const fn code(self) -> i32 {
        match self {
            Self::Again => 11,
            Self::BadDescriptor => 9,
            Self::Invalid => 22,
            Self::NotSupported => 95,
            Self::NoProtocolOption => 92,
            Self::AddrInUse => 98,
            Self::DomainNotSupported => 97,
            Self::ProtocolNotSupported => 93,
            Self::Terminated => HAUSNUMERO + 53,
            Self::Fsm => HAUSNUMERO + 54,
            Self::Other(code) => code,
        }
    }

    /// Map a numeric code back to an `Errno`.
    pub const fn from_code(code: i32) -> Self {
        match code {
            11 => Self::Again,
            9 => Self::BadDescriptor,
            22 => Self::Invalid,
            95 => Self::NotSupported,
            92 => Self::NoProtocolOption,
            98 => Self::AddrInUse,
            97 => Self::DomainNotSupported,
            93 => Self::ProtocolNotSupported,
            c if c == HAUSNUMERO + 53 => Self::Terminated,
            c if c == HAUSNUMERO + 54 => Self::Fsm,
            other => Self::Other(other),
        }
    }

    /// Human readable description (the `strerror` text).
    pub const fn description(self) -> &'static str {
        match self {
            Self::Again => "Resource temporarily unavailable",
            Self::BadDescriptor => "Bad file descriptor",
            Self::Invalid => "Invalid argument",
            Self::NotSupported => "Operation not supported",
            Self::NoProtocolOption => "Protocol not available",
            Self::AddrInUse => "Address already in use",
            Self::DomainNotSupported => "Address family not supported by protocol",
            Self::ProtocolNotSupported => "Protocol not supported",
            Self::Terminated => "Nanomsg library was terminated",
            Self::Fsm => "Operation cannot be performed in this state",
            Self::Other(_) => "Unknown error",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Description for a raw error code.
pub fn strerror(code: i32) -> &'static str {
    Errno::from_code(code).description()
}

/// Failure reported by the transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description}")]
pub struct TransportError {
    errno: Errno,
    description: String,
}

impl TransportError {
    /// Error with the standard description for `errno`.
    pub fn new(errno: Errno) -> Self {
        Self {
            errno,
            description: errno.description().to_string(),
        }
    }

    /// Error with a more specific description.
    pub fn with_context(errno: Errno, context: impl fmt::Display) -> Self {
        Self {
            errno,
            description: format!("{}: {context}", errno.description()),
        }
    }

    #[must_use]
    pub const fn errno(&self) -> Errno {
        self.errno
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// `EAGAIN`: the normal retry trigger, never a failure.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        self.errno == Errno::Again
    }
}

impl From<Errno> for TransportError {
    fn from(errno: Errno) -> Self {
        Self::new(errno)
    }
}

/// Public error type for nanosock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Socket domain is neither normal nor raw.
    #[error("unrecognised socket domain {0}")]
    InvalidDomain(i32),

    /// Unknown socket type name.
    #[error("unrecognised socket type {0}")]
    InvalidProtocol(String),

    /// Rejected argument (device construction and similar).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not valid for this socket.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Protocol state machine refused the operation.
    #[error("protocol state violation: {0}")]
    FsmViolation(TransportError),

    /// The handle is not valid.
    #[error("bad descriptor: {0}")]
    BadDescriptor(TransportError),

    /// Option level or key not recognised.
    #[error("unsupported option: {0}")]
    UnsupportedOption(TransportError),

    /// The transport library was terminated.
    #[error("terminated: {0}")]
    Terminated(TransportError),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(TransportError),
}

/// Result type alias for nanosock operations
pub type Result<T> = std::result::Result<T, SocketError>;

impl SocketError {
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Collaborator error code behind this error, if any.
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::FsmViolation(e)
            | Self::BadDescriptor(e)
            | Self::UnsupportedOption(e)
            | Self::Terminated(e)
            | Self::Transport(e) => Some(e.errno()),
            _ => None,
        }
    }

    /// Caller misuse, raised synchronously at the call site.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDomain(_)
                | Self::InvalidProtocol(_)
                | Self::InvalidArgument(_)
                | Self::InvalidOperation(_)
        )
    }
}

impl From<TransportError> for SocketError {
    fn from(err: TransportError) -> Self {
        match err.errno() {
            Errno::BadDescriptor => Self::BadDescriptor(err),
            Errno::NoProtocolOption => Self::UnsupportedOption(err),
            Errno::Terminated => Self::Terminated(err),
            Errno::Fsm => Self::FsmViolation(err),
            _ => Self::Transport(err),
        }
    }
}
