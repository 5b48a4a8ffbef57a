use crate::error::{Error, FragmentationError, ShortBufferError, TransportError};
use crate::pool::BufferPool;
use crate::transport::{BoxPacketConn, BoxStreamConn, PacketConn};
use async_trait::async_trait;
use bytes::BytesMut;
use socks5_proto::{Address, UdpHeader};
use std::io::Cursor;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Pairs a SOCKS5 control TCP stream with its UDP relay as a single
/// resource: closing either, or the control stream closing from the peer
/// side, ends the association. The control stream is the liveness signal;
/// this type does not attempt to detect the peer closing it except on an
/// explicit [`close`](Self::close) or the next failed UDP I/O.
pub struct Socks5Association {
    ctrl: Mutex<BoxStreamConn>,
    relay: BoxPacketConn,
    target: Address,
    pool: BufferPool,
}

impl Socks5Association {
    pub fn new(ctrl: BoxStreamConn, relay: BoxPacketConn, target: Address) -> Self {
        Self { ctrl: Mutex::new(ctrl), relay, target, pool: BufferPool::new() }
    }
}

#[async_trait]
impl PacketConn for Socks5Association {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut raw = self.pool.acquire();
        let n = self.relay.recv(&mut raw).await?;

        let mut cursor = Cursor::new(&raw[..n]);
        let header = UdpHeader::read_from(&mut cursor).await?;

        if header.frag != 0 {
            return Err(FragmentationError.into());
        }

        let header_len = header.serialized_len();
        let payload = &raw[header_len..n];

        if payload.len() > buf.len() {
            return Err(ShortBufferError { buf_len: buf.len(), payload_len: payload.len() }.into());
        }

        buf[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    }

    async fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        let header = UdpHeader::new(0x00, self.target.clone());
        let mut datagram = BytesMut::with_capacity(header.serialized_len() + buf.len());
        header.write_to_buf(&mut datagram);
        datagram.extend_from_slice(buf);

        let sent = self.relay.send(&datagram).await?;
        Ok(sent.saturating_sub(header.serialized_len()))
    }

    async fn close(&self) -> Result<(), Error> {
        let ctrl_result = self.ctrl.lock().await.shutdown().await;
        let relay_result = self.relay.close().await;

        match (ctrl_result, relay_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) => Err(TransportError::Io(err).into()),
            (Ok(()), Err(err)) => Err(err),
            (Err(ctrl_err), Err(relay_err)) => {
                tracing::warn!(%relay_err, "udp relay close also failed after control stream shutdown error");
                Err(TransportError::Io(ctrl_err).into())
            }
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.relay.local_addr()
    }

    fn remote_addr(&self) -> String {
        self.target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StreamConn;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    struct MockStreamConn(tokio_test::io::Mock);

    impl AsyncRead for MockStreamConn {
        fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for MockStreamConn {
        fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_shutdown(cx)
        }
    }

    impl StreamConn for MockStreamConn {}

    struct MockPacketConn {
        inbound: Mutex<VecDeque<Vec<u8>>>,
        outbound: Mutex<Vec<Vec<u8>>>,
    }

    impl MockPacketConn {
        fn new(inbound: Vec<Vec<u8>>) -> Self {
            Self { inbound: Mutex::new(inbound.into()), outbound: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl PacketConn for MockPacketConn {
        async fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
            let datagram = self.inbound.lock().await.pop_front().expect("no queued datagram");
            let n = datagram.len();
            buf[..n].copy_from_slice(&datagram);
            Ok(n)
        }

        async fn send(&self, buf: &[u8]) -> Result<usize, Error> {
            self.outbound.lock().await.push(buf.to_vec());
            Ok(buf.len())
        }

        async fn close(&self) -> Result<(), Error> {
            Ok(())
        }

        fn local_addr(&self) -> Result<SocketAddr, Error> {
            Ok("127.0.0.1:0".parse().unwrap())
        }

        fn remote_addr(&self) -> String {
            "proxy-relay:0".to_string()
        }
    }

    #[async_trait]
    impl PacketConn for std::sync::Arc<MockPacketConn> {
        async fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
            (**self).recv(buf).await
        }

        async fn send(&self, buf: &[u8]) -> Result<usize, Error> {
            (**self).send(buf).await
        }

        async fn close(&self) -> Result<(), Error> {
            (**self).close().await
        }

        fn local_addr(&self) -> Result<SocketAddr, Error> {
            (**self).local_addr()
        }

        fn remote_addr(&self) -> String {
            (**self).remote_addr()
        }
    }

    fn association(inbound: Vec<Vec<u8>>, target: &str) -> (Socks5Association, std::sync::Arc<MockPacketConn>) {
        let ctrl: BoxStreamConn = Box::new(MockStreamConn(tokio_test::io::Builder::new().build()));
        let relay = std::sync::Arc::new(MockPacketConn::new(inbound));
        let boxed_relay: BoxPacketConn = Box::new(relay.clone());
        (Socks5Association::new(ctrl, boxed_relay, Address::parse(target).unwrap()), relay)
    }

    #[tokio::test]
    async fn send_prepends_header_matching_scenario_s8() {
        let (assoc, relay) = association(Vec::new(), "1.2.3.4:9999");
        let sent = assoc.send(b"ping").await.unwrap();
        assert_eq!(sent, 4);

        let datagrams = relay.outbound.lock().await;
        assert_eq!(
            datagrams[0],
            vec![0x00, 0x00, 0x00, 0x01, 1, 2, 3, 4, 0x27, 0x0F, b'p', b'i', b'n', b'g']
        );
    }

    #[tokio::test]
    async fn recv_strips_header_matching_scenario_s8() {
        let datagram = vec![0x00, 0x00, 0x00, 0x01, 5, 6, 7, 8, 0x00, 0x50, b'p', b'o', b'n', b'g'];
        let (assoc, _relay) = association(vec![datagram], "1.2.3.4:9999");

        let mut buf = [0u8; 16];
        let n = assoc.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[tokio::test]
    async fn recv_rejects_fragmented_datagram_scenario_s9() {
        let datagram = vec![0x00, 0x00, 0x01, 0x01, 5, 6, 7, 8, 0x00, 0x50, b'p', b'o', b'n', b'g'];
        let (assoc, _relay) = association(vec![datagram], "1.2.3.4:9999");

        let mut buf = [0u8; 16];
        let err = assoc.recv(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Fragmentation(FragmentationError)));
    }
}
