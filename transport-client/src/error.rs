//! The error taxonomy described in the design notes: one enum per failure
//! class, converging into a single [`Error`] so callers who don't care about
//! the distinction can propagate with `?`, while callers who do can match on
//! the specific variant (or, for [`ReplyError`], the specific numeric code).

use socks5_proto::handshake::Method;
use std::{fmt, io};
use thiserror::Error;

/// Malformed pipeline, unknown scheme, out-of-range parameter, or a
/// packet-incompatible spec in a packet pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed pipeline spec {0:?}")]
    Malformed(String),
    #[error("unknown dialer scheme {0:?}")]
    UnknownScheme(String),
    #[error("scheme {0:?} is not supported for packet dialers")]
    PacketIncompatible(String),
    #[error("numeric parameter out of range in {spec:?}: {detail}")]
    OutOfRange { spec: String, detail: String },
    #[error("scheme {0:?} is recognized but has no registered wrapper factory")]
    UnlinkedScheme(String),
}

/// Underlying network I/O failure: connect, read, write, timeout, or
/// context cancellation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connecting to {addr}: {source}")]
    Connect { addr: String, #[source] source: io::Error },
    #[error("operation cancelled before completion")]
    Cancelled,
    #[error("operation timed out")]
    TimedOut,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Malformed response from the proxy: wrong version byte, wrong reserved
/// bytes, unknown ATYP, short read, or a method the client never offered.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Wire(#[from] socks5_proto::Error),
    #[error("proxy selected method {selected:?}, which was not among the offered methods {offered:?}")]
    MethodMismatch { offered: Vec<Method>, selected: Method },
}

/// The proxy rejected the offered username/password.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("username/password authentication rejected by proxy")]
pub struct AuthError;

/// A SOCKS5 reply code other than `0x00` (success).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("SOCKS5 request failed with reply {code:#04x} ({kind})")]
pub struct ReplyError {
    pub code: u8,
    pub kind: ReplyErrorKind,
}

impl ReplyError {
    pub fn from_code(code: u8) -> Self {
        Self { code, kind: ReplyErrorKind::from_code(code) }
    }
}

/// The enumerated SOCKS5 reply codes (RFC 1928 §6), plus a catch-all for
/// vendor-specific codes the RFC doesn't define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyErrorKind {
    GeneralFailure,
    ConnectionNotAllowed,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
    Unknown,
}

impl ReplyErrorKind {
    fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::GeneralFailure,
            0x02 => Self::ConnectionNotAllowed,
            0x03 => Self::NetworkUnreachable,
            0x04 => Self::HostUnreachable,
            0x05 => Self::ConnectionRefused,
            0x06 => Self::TtlExpired,
            0x07 => Self::CommandNotSupported,
            0x08 => Self::AddressTypeNotSupported,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ReplyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GeneralFailure => "general failure",
            Self::ConnectionNotAllowed => "connection not allowed by ruleset",
            Self::NetworkUnreachable => "network unreachable",
            Self::HostUnreachable => "host unreachable",
            Self::ConnectionRefused => "connection refused",
            Self::TtlExpired => "TTL expired",
            Self::CommandNotSupported => "command not supported",
            Self::AddressTypeNotSupported => "address type not supported",
            Self::Unknown => "unrecognized reply code",
        };
        f.write_str(text)
    }
}

/// An inbound SOCKS5 UDP datagram had a non-zero fragment byte. Fragment
/// reassembly is out of scope; such datagrams are rejected outright.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("inbound UDP datagram had a non-zero fragment byte: fragmentation is not supported")]
pub struct FragmentationError;

/// The caller's receive buffer was smaller than an inbound datagram's payload.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("receive buffer of {buf_len} bytes is too small for a {payload_len}-byte payload")]
pub struct ShortBufferError {
    pub buf_len: usize,
    pub payload_len: usize,
}

/// The converging error type for the whole crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
    #[error(transparent)]
    Fragmentation(#[from] FragmentationError),
    #[error(transparent)]
    ShortBuffer(#[from] ShortBufferError),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(TransportError::Io(err))
    }
}

impl From<socks5_proto::Error> for Error {
    fn from(err: socks5_proto::Error) -> Self {
        Error::Protocol(ProtocolError::Wire(err))
    }
}

impl From<socks5_proto::AddressError> for Error {
    fn from(err: socks5_proto::AddressError) -> Self {
        Error::Protocol(ProtocolError::Wire(err.into()))
    }
}

impl From<socks5_proto::handshake::password::Error> for Error {
    fn from(err: socks5_proto::handshake::password::Error) -> Self {
        use socks5_proto::handshake::password::Error as PwError;
        match err {
            PwError::Io(io_err) => Error::Transport(TransportError::Io(io_err)),
            PwError::SubNegotiationVersion { version } => {
                Error::Protocol(ProtocolError::Wire(socks5_proto::Error::Protocol(
                    socks5_proto::ProtocolError::ProtocolVersion { version },
                )))
            }
        }
    }
}
