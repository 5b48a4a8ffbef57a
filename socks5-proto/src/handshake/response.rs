use super::Method;
use crate::{Error, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt};

/// SOCKS5 handshake (method selection) response
///
/// ```plain
/// +-----+--------+
/// | VER | METHOD |
/// +-----+--------+
/// |  1  |   1    |
/// +-----+--------+
/// ```
///
/// Re-exported as `handshake::Response`. The client only ever reads this
/// frame, so no `write_to` is provided.
#[derive(Clone, Debug)]
pub struct HandshakeResponse {
    pub method: Method,
}

impl HandshakeResponse {
    pub fn new(method: Method) -> Self {
        Self { method }
    }

    pub async fn read_from<R>(r: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let ver = r.read_u8().await?;

        if ver != crate::SOCKS_VERSION {
            return Err(ProtocolError::ProtocolVersion { version: ver }.into());
        }

        let method = Method::from(r.read_u8().await?);

        Ok(Self { method })
    }

    pub fn serialized_len(&self) -> usize {
        2
    }
}
