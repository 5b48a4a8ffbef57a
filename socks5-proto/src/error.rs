//! Error types for the SOCKS5 protocol wire format.

use crate::{handshake::Method, AddressError};
use std::io::{Error as IoError, ErrorKind};
use thiserror::Error;

/// Errors that occur while parsing a protocol frame's fixed-size header.
///
/// These are lower-level than [`AddressError`]: they cover the bytes that
/// precede the address trailer in each frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported SOCKS version {version:#04x}")]
    ProtocolVersion { version: u8 },

    #[error("no acceptable handshake method, offered {methods:?}")]
    NoAcceptableHandshakeMethod { methods: Vec<Method> },

    #[error("unsupported command {command:#04x}")]
    InvalidCommand { command: u8 },

    #[error("reserved bytes {bytes:02x?} must be 0x00 0x00")]
    ReservedBytesNotZero { bytes: [u8; 2] },
}

impl From<ProtocolError> for IoError {
    fn from(err: ProtocolError) -> Self {
        IoError::new(ErrorKind::Other, err)
    }
}

/// Converging error type for everything that can go wrong decoding a SOCKS5 frame.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Io(#[from] IoError),
}

impl From<Error> for IoError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            err => IoError::new(ErrorKind::Other, err),
        }
    }
}
