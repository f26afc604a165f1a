//! Socket domains and scalability-protocol variants.
//!
//! The protocol set is closed: every variant, its numeric code, its name and
//! its send/receive capabilities live in this module, so validating or adding
//! a variant is a table change rather than scattered branching.

use crate::error::SocketError;
use std::fmt;
use std::str::FromStr;

/// Numeric code of the normal socket domain.
pub const AF_SP: i32 = 1;

/// Numeric code of the raw socket domain.
pub const AF_SP_RAW: i32 = 2;

/// Socket domain.
///
/// Raw sockets skip protocol state machines and are not polled for inbound
/// messages automatically; devices are built from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    #[default]
    Normal,
    Raw,
}

impl Domain {
    pub const fn code(self) -> i32 {
        match self {
            Self::Normal => AF_SP,
            Self::Raw => AF_SP_RAW,
        }
    }

    /// Validate a numeric domain code.
    ///
    /// # Errors
    ///
    /// [`SocketError::InvalidDomain`] for anything but `AF_SP` / `AF_SP_RAW`.
    pub fn from_code(code: i32) -> Result<Self, SocketError> {
        match code {
            AF_SP => Ok(Self::Normal),
            AF_SP_RAW => Ok(Self::Raw),
            other => Err(SocketError::InvalidDomain(other)),
        }
    }

    pub const fn is_raw(self) -> bool {
        matches!(self, Self::Raw)
    }
}

impl TryFrom<i32> for Domain {
    type Error = SocketError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// Which directions a protocol variant may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_send: bool,
    pub can_receive: bool,
}

impl Capabilities {
    const fn new(can_send: bool, can_receive: bool) -> Self {
        Self {
            can_send,
            can_receive,
        }
    }
}

/// Scalability-protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Protocol {
    /// Exclusive bidirectional channel
    Pair = 16,

    /// Publisher (fan-out)
    Pub = 32,

    /// Subscriber (prefix filtered)
    Sub = 33,

    /// Request side of request/reply
    Req = 48,

    /// Reply side of request/reply
    Rep = 49,

    /// Pipeline producer
    Push = 80,

    /// Pipeline consumer
    Pull = 81,

    /// Survey broadcaster
    Surveyor = 98,

    /// Survey responder
    Respondent = 99,

    /// Many-to-many bus
    Bus = 112,
}

impl Protocol {
    /// Every supported variant.
    pub const ALL: [Protocol; 10] = [
        Self::Req,
        Self::Rep,
        Self::Pair,
        Self::Push,
        Self::Pull,
        Self::Pub,
        Self::Sub,
        Self::Bus,
        Self::Surveyor,
        Self::Respondent,
    ];

    /// The capability table.
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Req => Capabilities::new(true, true),
            Self::Rep => Capabilities::new(true, true),
            Self::Pair => Capabilities::new(true, true),
            Self::Push => Capabilities::new(true, false),
            Self::Pull => Capabilities::new(false, true),
            Self::Pub => Capabilities::new(true, false),
            Self::Sub => Capabilities::new(false, true),
            Self::Bus => Capabilities::new(true, true),
            Self::Surveyor => Capabilities::new(true, true),
            Self::Respondent => Capabilities::new(true, true),
        }
    }

    pub const fn can_send(self) -> bool {
        self.capabilities().can_send
    }

    pub const fn can_receive(self) -> bool {
        self.capabilities().can_receive
    }

    /// Numeric protocol code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Map a numeric code back to a variant.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Lowercase name accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Pub => "pub",
            Self::Sub => "sub",
            Self::Req => "req",
            Self::Rep => "rep",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Surveyor => "surveyor",
            Self::Respondent => "respondent",
            Self::Bus => "bus",
        }
    }

    /// Check if this variant may be linked to the given peer variant.
    pub fn is_compatible(self, peer: Protocol) -> bool {
        matches!(
            (self, peer),
            (Self::Pair, Self::Pair)
                | (Self::Pub, Self::Sub)
                | (Self::Sub, Self::Pub)
                | (Self::Req, Self::Rep)
                | (Self::Rep, Self::Req)
                | (Self::Push, Self::Pull)
                | (Self::Pull, Self::Push)
                | (Self::Surveyor, Self::Respondent)
                | (Self::Respondent, Self::Surveyor)
                | (Self::Bus, Self::Bus)
        )
    }
}

impl FromStr for Protocol {
    type Err = SocketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SocketError::InvalidProtocol(s.to_string()))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}
