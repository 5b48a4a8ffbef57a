//! The capability interfaces the rest of the crate is polymorphic over.
//!
//! A [`StreamConn`]/[`PacketConn`] is whatever `tokio`'s own duplex
//! primitives already give us (`AsyncRead + AsyncWrite` with independent
//! half-close, and a connected `UdpSocket`-shaped read/write pair,
//! respectively) so the traits below add only what the wrapped dialers
//! actually need: a name for "the thing StreamDialer returns" and a name
//! for "the thing PacketDialer returns".

use crate::context::DialContext;
use crate::error::Error;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// A full-duplex byte stream with independent half-close of read and write.
/// `AsyncWrite::poll_shutdown` closes only the write side; the read side
/// keeps delivering until the peer closes or the connection is dropped.
///
/// `peer_addr` defaults to "unsupported": most wrapper layers (splitting,
/// proxy-protocol prefixing) have no address of their own and simply don't
/// override it. Layers grounded directly on a socket (the direct TCP
/// dialer) override it to answer the SOCKS5 UDP-associate bind-address
/// fallback in [`crate::socks5::client`].
pub trait StreamConn: AsyncRead + AsyncWrite + Send + Sync + Unpin {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "peer address not available for this stream type"))
    }
}

/// A boxed, type-erased [`StreamConn`], the common currency between
/// dialers that don't know each other's concrete stream type.
pub type BoxStreamConn = Box<dyn StreamConn>;

impl StreamConn for Box<dyn StreamConn> {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        (**self).peer_addr()
    }
}

/// A connected datagram conversation bound to one remote peer.
#[async_trait]
pub trait PacketConn: Send + Sync {
    /// Reads one datagram's payload into `buf`. Returns the payload length.
    /// Fails with [`crate::error::ShortBufferError`] if `buf` is smaller
    /// than the payload, without losing the datagram.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Sends `buf` as a single datagram to the bound remote.
    async fn send(&self, buf: &[u8]) -> Result<usize, Error>;

    /// Closes every resource backing this conversation. Errors from
    /// multiple underlying resources are joined, not dropped.
    async fn close(&self) -> Result<(), Error>;

    fn local_addr(&self) -> Result<SocketAddr, Error>;

    /// The declared target this conversation is bound to, in `host:port`
    /// form. Not necessarily a literal IP: the target may be a domain name
    /// the dialer resolves internally.
    fn remote_addr(&self) -> String;
}

pub type BoxPacketConn = Box<dyn PacketConn>;

/// Opens a [`StreamConn`] to an address supplied at call time.
#[async_trait]
pub trait StreamDialer: Send + Sync {
    async fn dial_stream(&self, ctx: &DialContext, addr: &str) -> Result<BoxStreamConn, Error>;
}

/// Opens a [`PacketConn`] to an address supplied at call time.
#[async_trait]
pub trait PacketDialer: Send + Sync {
    async fn dial_packet(&self, ctx: &DialContext, addr: &str) -> Result<BoxPacketConn, Error>;
}

/// Pipeline stages share their inner dialer rather than owning it, since a
/// single base dialer may back several composed layers at once (e.g. a
/// `socks5` layer's control-channel dialer is also the pipeline's own
/// `StreamDialer`). `Arc<dyn StreamDialer>` forwards so composed layers can
/// be built directly on top of a shared `Arc`.
#[async_trait]
impl<T: StreamDialer + ?Sized> StreamDialer for Arc<T> {
    async fn dial_stream(&self, ctx: &DialContext, addr: &str) -> Result<BoxStreamConn, Error> {
        (**self).dial_stream(ctx, addr).await
    }
}

#[async_trait]
impl<T: PacketDialer + ?Sized> PacketDialer for Arc<T> {
    async fn dial_packet(&self, ctx: &DialContext, addr: &str) -> Result<BoxPacketConn, Error> {
        (**self).dial_packet(ctx, addr).await
    }
}

/// A [`StreamDialer`] with its target already bound; `connect` dials it.
#[async_trait]
pub trait StreamEndpoint: Send + Sync {
    async fn connect(&self, ctx: &DialContext) -> Result<BoxStreamConn, Error>;
}

/// A [`PacketDialer`] with its target already bound.
#[async_trait]
pub trait PacketEndpoint: Send + Sync {
    async fn connect(&self, ctx: &DialContext) -> Result<BoxPacketConn, Error>;
}

/// Adapts a [`StreamDialer`] plus a fixed address into a [`StreamEndpoint`].
pub struct FixedStreamEndpoint<D> {
    dialer: D,
    addr: String,
}

impl<D: StreamDialer> FixedStreamEndpoint<D> {
    pub fn new(dialer: D, addr: impl Into<String>) -> Self {
        Self { dialer, addr: addr.into() }
    }
}

#[async_trait]
impl<D: StreamDialer> StreamEndpoint for FixedStreamEndpoint<D> {
    async fn connect(&self, ctx: &DialContext) -> Result<BoxStreamConn, Error> {
        self.dialer.dial_stream(ctx, &self.addr).await
    }
}

/// Adapts a [`PacketDialer`] plus a fixed address into a [`PacketEndpoint`].
pub struct FixedPacketEndpoint<D> {
    dialer: D,
    addr: String,
}

impl<D: PacketDialer> FixedPacketEndpoint<D> {
    pub fn new(dialer: D, addr: impl Into<String>) -> Self {
        Self { dialer, addr: addr.into() }
    }
}

#[async_trait]
impl<D: PacketDialer> PacketEndpoint for FixedPacketEndpoint<D> {
    async fn connect(&self, ctx: &DialContext) -> Result<BoxPacketConn, Error> {
        self.dialer.dial_packet(ctx, &self.addr).await
    }
}
