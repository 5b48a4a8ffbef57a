use crate::{Address, Error, ProtocolError};
use bytes::{BufMut, BytesMut};
use std::io::Error as IoError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// SOCKS5 UDP packet header
///
/// ```plain
/// +-----+------+------+----------+----------+----------+
/// | RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +-----+------+------+----------+----------+----------+
/// |  2  |  1   |  1   | Variable |    2     | Variable |
/// +-----+------+------+----------+----------+----------+
/// ```
///
/// Reserved bytes and the fragment byte are emitted as zero on the wire. The
/// client never reassembles fragments: a non-zero `frag` on receipt is an
/// error the caller must surface (see `transport-client`'s `FragmentationError`).
#[derive(Clone, Debug)]
pub struct UdpHeader {
    pub frag: u8,
    pub address: Address,
}

impl UdpHeader {
    pub const fn new(frag: u8, address: Address) -> Self {
        Self { frag, address }
    }

    pub async fn read_from<R>(r: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let mut rsv = [0u8; 2];
        r.read_exact(&mut rsv).await?;
        if rsv != [0x00, 0x00] {
            return Err(ProtocolError::ReservedBytesNotZero { bytes: rsv }.into());
        }

        let frag = r.read_u8().await?;
        let address = Address::read_from(r).await?;

        Ok(Self::new(frag, address))
    }

    pub async fn write_to<W>(&self, w: &mut W) -> Result<(), IoError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.write_to_buf(&mut buf);
        w.write_all(&buf).await?;

        Ok(())
    }

    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        buf.put_bytes(0x00, 2);
        buf.put_u8(self.frag);
        self.address.write_to_buf(buf);
    }

    pub fn serialized_len(&self) -> usize {
        2 + 1 + self.address.serialized_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let header = UdpHeader::new(0x00, Address::parse("1.2.3.4:9999").unwrap());
        let mut buf = Vec::new();
        header.write_to(&mut buf).await.unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x00, 0x01, 1, 2, 3, 4, 0x27, 0x0F]);

        let decoded = UdpHeader::read_from(&mut Cursor::new(buf)).await.unwrap();
        assert_eq!(decoded.frag, 0);
        assert_eq!(decoded.address.to_string(), "1.2.3.4:9999");
    }

    #[tokio::test]
    async fn nonzero_reserved_bytes_are_rejected() {
        let buf = vec![0x00, 0xFF, 0x00, 0x01, 1, 2, 3, 4, 0x27, 0x0F];
        let err = UdpHeader::read_from(&mut Cursor::new(buf)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(crate::ProtocolError::ReservedBytesNotZero { bytes: [0x00, 0xFF] })
        ));
    }
}
