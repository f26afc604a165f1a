//! Named constant introspection.
//!
//! Enumerates every constant a caller may need to talk to the transport by
//! number: domains, protocols, option levels and keys, flags, error codes.

use crate::error::Errno;
use crate::options;
use crate::protocol::{Protocol, AF_SP, AF_SP_RAW};
use crate::transport::Flags;

/// Group a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolNamespace {
    Domain,
    Protocol,
    OptionLevel,
    SocketOption,
    ProtocolOption,
    Flag,
    Error,
}

/// One named constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: &'static str,
    pub value: i32,
    pub namespace: SymbolNamespace,
}

const fn sym(name: &'static str, value: i32, namespace: SymbolNamespace) -> SymbolInfo {
    SymbolInfo {
        name,
        value,
        namespace,
    }
}

use SymbolNamespace as Ns;

static SYMBOLS: &[SymbolInfo] = &[
    sym("AF_SP", AF_SP, Ns::Domain),
    sym("AF_SP_RAW", AF_SP_RAW, Ns::Domain),
    sym("NN_PAIR", Protocol::Pair.code(), Ns::Protocol),
    sym("NN_PUB", Protocol::Pub.code(), Ns::Protocol),
    sym("NN_SUB", Protocol::Sub.code(), Ns::Protocol),
    sym("NN_REQ", Protocol::Req.code(), Ns::Protocol),
    sym("NN_REP", Protocol::Rep.code(), Ns::Protocol),
    sym("NN_PUSH", Protocol::Push.code(), Ns::Protocol),
    sym("NN_PULL", Protocol::Pull.code(), Ns::Protocol),
    sym("NN_SURVEYOR", Protocol::Surveyor.code(), Ns::Protocol),
    sym("NN_RESPONDENT", Protocol::Respondent.code(), Ns::Protocol),
    sym("NN_BUS", Protocol::Bus.code(), Ns::Protocol),
    sym("NN_SOL_SOCKET", options::SOL_SOCKET, Ns::OptionLevel),
    sym("NN_LINGER", options::LINGER, Ns::SocketOption),
    sym("NN_SNDBUF", options::SNDBUF, Ns::SocketOption),
    sym("NN_RCVBUF", options::RCVBUF, Ns::SocketOption),
    sym("NN_SNDTIMEO", options::SNDTIMEO, Ns::SocketOption),
    sym("NN_RCVTIMEO", options::RCVTIMEO, Ns::SocketOption),
    sym("NN_RECONNECT_IVL", options::RECONNECT_IVL, Ns::SocketOption),
    sym("NN_RECONNECT_IVL_MAX", options::RECONNECT_IVL_MAX, Ns::SocketOption),
    sym("NN_DOMAIN", options::DOMAIN, Ns::SocketOption),
    sym("NN_PROTOCOL", options::PROTOCOL, Ns::SocketOption),
    sym("NN_SOCKET_NAME", options::SOCKET_NAME, Ns::SocketOption),
    sym("NN_SUB_SUBSCRIBE", options::SUB_SUBSCRIBE, Ns::ProtocolOption),
    sym("NN_SUB_UNSUBSCRIBE", options::SUB_UNSUBSCRIBE, Ns::ProtocolOption),
    sym("NN_SURVEYOR_DEADLINE", options::SURVEYOR_DEADLINE, Ns::ProtocolOption),
    sym("NN_REQ_RESEND_IVL", options::REQ_RESEND_IVL, Ns::ProtocolOption),
    sym("NN_DONTWAIT", Flags::DONTWAIT.bits() as i32, Ns::Flag),
    sym("EAGAIN", Errno::Again.code(), Ns::Error),
    sym("EBADF", Errno::BadDescriptor.code(), Ns::Error),
    sym("EINVAL", Errno::Invalid.code(), Ns::Error),
    sym("ENOTSUP", Errno::NotSupported.code(), Ns::Error),
    sym("ENOPROTOOPT", Errno::NoProtocolOption.code(), Ns::Error),
    sym("EADDRINUSE", Errno::AddrInUse.code(), Ns::Error),
    sym("EAFNOSUPPORT", Errno::DomainNotSupported.code(), Ns::Error),
    sym("EPROTONOSUPPORT", Errno::ProtocolNotSupported.code(), Ns::Error),
    sym("ETERM", Errno::Terminated.code(), Ns::Error),
    sym("EFSM", Errno::Fsm.code(), Ns::Error),
];

/// Name and value of the symbol at `index`, `None` past the end.
pub fn symbol(index: usize) -> Option<(&'static str, i32)> {
    SYMBOLS.get(index).map(|s| (s.name, s.value))
}

/// Full description of the symbol at `index`.
pub fn symbol_info(index: usize) -> Option<&'static SymbolInfo> {
    SYMBOLS.get(index)
}

/// Value of a named symbol.
pub fn lookup(name: &str) -> Option<i32> {
    SYMBOLS.iter().find(|s| s.name == name).map(|s| s.value)
}

/// Every symbol, in index order.
pub fn symbols() -> impl Iterator<Item = &'static SymbolInfo> {
    SYMBOLS.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("NN_SUB"), Some(33));
        assert_eq!(lookup("AF_SP_RAW"), Some(2));
        assert_eq!(lookup("NN_DEALER"), None);
    }

    #[test]
    fn test_index_walk_ends() {
        assert_eq!(symbol(0), Some(("AF_SP", 1)));
        let count = symbols().count();
        assert!(symbol(count).is_none());
        assert!(symbol_info(count - 1).is_some());
    }

    #[test]
    fn test_every_protocol_listed() {
        for protocol in Protocol::ALL {
            assert!(
                symbols().any(|s| s.namespace == SymbolNamespace::Protocol && s.value == protocol.code()),
                "{protocol}"
            );
        }
    }
}
