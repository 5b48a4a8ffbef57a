use crate::{Address, Error, ProtocolError, Reply};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Response
///
/// ```plain
/// +-----+-----+-------+------+----------+----------+
/// | VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +-----+-----+-------+------+----------+----------+
/// |  1  |  1  | X'00' |  1   | Variable |    2     |
/// +-----+-----+-------+------+----------+----------+
/// ```
///
/// The client only ever reads this frame, so no `write_to` is provided.
#[derive(Clone, Debug)]
pub struct Response {
    pub reply: Reply,
    pub address: Address,
}

impl Response {
    pub fn new(reply: Reply, address: Address) -> Self {
        Self { reply, address }
    }

    pub async fn read_from<R>(r: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let ver = r.read_u8().await?;

        if ver != crate::SOCKS_VERSION {
            return Err(ProtocolError::ProtocolVersion { version: ver }.into());
        }

        let mut buf = [0; 2];
        r.read_exact(&mut buf).await?;

        let reply = Reply::from(buf[0]);
        let address = Address::read_from(r).await?;

        Ok(Self { reply, address })
    }

    pub fn serialized_len(&self) -> usize {
        3 + self.address.serialized_len()
    }
}
