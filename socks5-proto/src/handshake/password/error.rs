use std::io::Error as IoError;
use thiserror::Error;

/// Wire-level errors from the username/password sub-negotiation (RFC 1929).
///
/// A rejected credential pair is not an error here: [`super::Response::status`]
/// is `false` in that case. This type only covers malformed frames.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("unsupported sub-negotiation version {version:#04x}")]
    SubNegotiationVersion { version: u8 },
}
