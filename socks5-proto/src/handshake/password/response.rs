use super::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// SOCKS5 password handshake response
///
/// ```plain
/// +-----+--------+
/// | VER | STATUS |
/// +-----+--------+
/// |  1  |   1    |
/// +-----+--------+
/// ```
///
/// Per RFC 1929, any status other than `0x00` is a rejection. The client
/// only ever reads this frame, so no `write_to` is provided.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: bool,
}

impl Response {
    const STATUS_SUCCEEDED: u8 = 0x00;

    pub fn new(status: bool) -> Self {
        Self { status }
    }

    pub async fn read_from<R>(r: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let ver = r.read_u8().await?;

        if ver != super::SUBNEGOTIATION_VERSION {
            return Err(Error::SubNegotiationVersion { version: ver });
        }

        let status = r.read_u8().await? == Self::STATUS_SUCCEEDED;

        Ok(Self { status })
    }

    pub fn serialized_len(&self) -> usize {
        2
    }
}
