//! The base dialers: a direct TCP stream and a direct connected UDP socket.
//! Every composed pipeline bottoms out in one of these when it reaches the
//! left end of the pipeline (an empty pipeline is the identity, i.e. these
//! dialers used directly).

use crate::context::DialContext;
use crate::error::{Error, ShortBufferError, TransportError};
use crate::transport::{BoxPacketConn, BoxStreamConn, PacketConn, PacketDialer, StreamConn, StreamDialer};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpStream, UdpSocket};

/// Opens a plain TCP connection to the dialed address.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectStreamDialer;

#[async_trait]
impl StreamDialer for DirectStreamDialer {
    async fn dial_stream(&self, ctx: &DialContext, addr: &str) -> Result<BoxStreamConn, Error> {
        let addr = addr.to_owned();
        let stream = ctx
            .race(TcpStream::connect(addr.clone()))
            .await?
            .map_err(|source| TransportError::Connect { addr, source })?;
        Ok(Box::new(stream))
    }
}

impl StreamConn for TcpStream {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}

/// Opens a UDP socket bound to an ephemeral local port and connects it to
/// the dialed address, so subsequent `send`/`recv` need no destination.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectPacketDialer;

#[async_trait]
impl PacketDialer for DirectPacketDialer {
    async fn dial_packet(&self, ctx: &DialContext, addr: &str) -> Result<BoxPacketConn, Error> {
        let addr = addr.to_owned();
        let remote: SocketAddr = ctx
            .race(async { tokio::net::lookup_host(&addr).await?.next().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address resolved")
            }) })
            .await??;

        let bind_addr = if remote.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = ctx.race(UdpSocket::bind(bind_addr)).await??;
        ctx.race(socket.connect(remote)).await??;
        Ok(Box::new(ConnectedUdp { socket, remote }))
    }
}

/// A [`PacketConn`] over a `connect`-ed [`UdpSocket`]: every `send` goes to
/// the one peer the socket is connected to, every `recv` only accepts
/// datagrams from that peer (enforced by the kernel).
pub struct ConnectedUdp {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl ConnectedUdp {
    pub fn new(socket: UdpSocket, remote: SocketAddr) -> Self {
        Self { socket, remote }
    }
}

#[async_trait]
impl PacketConn for ConnectedUdp {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut scratch = vec![0u8; 65536];
        let n = self.socket.recv(&mut scratch).await?;
        if n > buf.len() {
            return Err(ShortBufferError { buf_len: buf.len(), payload_len: n }.into());
        }
        buf[..n].copy_from_slice(&scratch[..n]);
        Ok(n)
    }

    async fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        Ok(self.socket.send(buf).await?)
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    fn remote_addr(&self) -> String {
        self.remote.to_string()
    }
}
