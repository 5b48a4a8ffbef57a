use super::Method;
use bytes::{BufMut, BytesMut};
use std::io::Error as IoError;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// SOCKS5 handshake (method selection) request
///
/// ```plain
/// +-----+----------+----------+
/// | VER | NMETHODS | METHODS  |
/// +-----+----------+----------+
/// |  1  |    1     | 1 to 255 |
/// +-----+----------+----------|
/// ```
///
/// The client only ever writes this frame, so no `read_from` is provided.
#[derive(Clone, Debug)]
pub struct Request {
    pub methods: Vec<Method>,
}

impl Request {
    pub const fn new(methods: Vec<Method>) -> Self {
        Self { methods }
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
        buf.put_u8(crate::SOCKS_VERSION);
        buf.put_u8(self.methods.len() as u8);

        for method in &self.methods {
            buf.put_u8(method.0);
        }
    }

    pub fn serialized_len(&self) -> usize {
        1 + 1 + self.methods.len()
    }
}
