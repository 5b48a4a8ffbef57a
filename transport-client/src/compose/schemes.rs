//! Built-in pipeline stages that need no external collaborator: wrapping a
//! [`StreamDialer`]/[`PacketDialer`] to rewrite the dial target, to prepend
//! a PROXY protocol header, or to force write-flush boundaries via
//! [`crate::split`].

use crate::context::DialContext;
use crate::error::Error;
use crate::split::{fixed, SplitWriter};
use crate::transport::{BoxPacketConn, BoxStreamConn, PacketDialer, StreamConn, StreamDialer};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use socks5_proto::Address;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Forces a write-flush boundary after the dialed stream's first `n` bytes,
/// per `split:N` in a pipeline. `n == 0` disables splitting, matching
/// [`crate::split::Fixed`]'s own "zero means passthrough" rule.
pub struct SplitStreamDialer {
    inner: Arc<dyn StreamDialer>,
    n: usize,
}

impl SplitStreamDialer {
    pub fn new(inner: Arc<dyn StreamDialer>, n: usize) -> Self {
        Self { inner, n }
    }
}

#[async_trait]
impl StreamDialer for SplitStreamDialer {
    async fn dial_stream(&self, ctx: &DialContext, addr: &str) -> Result<BoxStreamConn, Error> {
        let stream = self.inner.dial_stream(ctx, addr).await?;
        Ok(Box::new(SplitWriter::new(stream, fixed(self.n))))
    }
}

/// Rewrites the dial target to a fixed `host:port` before delegating,
/// ignoring whatever address the caller asked for. Used for `override:`.
pub struct OverrideStreamDialer {
    inner: Arc<dyn StreamDialer>,
    target: String,
}

impl OverrideStreamDialer {
    pub fn new(inner: Arc<dyn StreamDialer>, target: String) -> Self {
        Self { inner, target }
    }
}

#[async_trait]
impl StreamDialer for OverrideStreamDialer {
    async fn dial_stream(&self, ctx: &DialContext, _addr: &str) -> Result<BoxStreamConn, Error> {
        self.inner.dial_stream(ctx, &self.target).await
    }
}

pub struct OverridePacketDialer {
    inner: Arc<dyn PacketDialer>,
    target: String,
}

impl OverridePacketDialer {
    pub fn new(inner: Arc<dyn PacketDialer>, target: String) -> Self {
        Self { inner, target }
    }
}

#[async_trait]
impl PacketDialer for OverridePacketDialer {
    async fn dial_packet(&self, ctx: &DialContext, _addr: &str) -> Result<BoxPacketConn, Error> {
        self.inner.dial_packet(ctx, &self.target).await
    }
}

/// PROXY protocol version prepended ahead of the dialed stream's traffic,
/// per `proxyproto:?version=1|2`. Carries the stream's own local/peer
/// addresses as the proxied source/destination, since this dialer has no
/// other notion of "the original client".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyProtoVersion {
    V1,
    V2,
}

pub struct ProxyProtoStreamDialer {
    inner: Arc<dyn StreamDialer>,
    version: ProxyProtoVersion,
}

impl ProxyProtoStreamDialer {
    pub fn new(inner: Arc<dyn StreamDialer>, version: ProxyProtoVersion) -> Self {
        Self { inner, version }
    }
}

#[async_trait]
impl StreamDialer for ProxyProtoStreamDialer {
    async fn dial_stream(&self, ctx: &DialContext, addr: &str) -> Result<BoxStreamConn, Error> {
        let mut stream = self.inner.dial_stream(ctx, addr).await?;
        let dest = Address::parse(addr)?.to_socket_addr().ok();
        let header = encode_proxy_header(self.version, stream.peer_addr().ok(), dest);
        ctx.race(stream.write_all(&header)).await??;
        Ok(stream)
    }
}

fn encode_proxy_header(version: ProxyProtoVersion, src: Option<SocketAddr>, dst: Option<SocketAddr>) -> Vec<u8> {
    match (version, src, dst) {
        (ProxyProtoVersion::V1, Some(src), Some(dst)) if src.is_ipv4() == dst.is_ipv4() => {
            let family = if src.is_ipv4() { "TCP4" } else { "TCP6" };
            format!("PROXY {family} {} {} {} {}\r\n", src.ip(), dst.ip(), src.port(), dst.port()).into_bytes()
        }
        (ProxyProtoVersion::V1, _, _) => b"PROXY UNKNOWN\r\n".to_vec(),
        (ProxyProtoVersion::V2, Some(src), Some(dst)) if src.is_ipv4() == dst.is_ipv4() => {
            let mut buf = BytesMut::new();
            buf.put_slice(&[0x0D, 0x0A, 0x0D, 0x0A, 0x00, 0x0D, 0x0A, 0x51, 0x55, 0x49, 0x54, 0x0A]);
            buf.put_u8(0x21); // version 2, PROXY command
            let (family_proto, addr_len) = if src.is_ipv4() { (0x11, 12) } else { (0x21, 36) };
            buf.put_u8(family_proto);
            buf.put_u16(addr_len);
            match (src, dst) {
                (SocketAddr::V4(s), SocketAddr::V4(d)) => {
                    buf.put_slice(&s.ip().octets());
                    buf.put_slice(&d.ip().octets());
                    buf.put_u16(s.port());
                    buf.put_u16(d.port());
                }
                (SocketAddr::V6(s), SocketAddr::V6(d)) => {
                    buf.put_slice(&s.ip().octets());
                    buf.put_slice(&d.ip().octets());
                    buf.put_u16(s.port());
                    buf.put_u16(d.port());
                }
                _ => unreachable!("family match guarded above"),
            }
            buf.to_vec()
        }
        (ProxyProtoVersion::V2, _, _) => {
            // LOCAL command, no address block: "this connection was not proxied".
            vec![
                0x0D, 0x0A, 0x0D, 0x0A, 0x00, 0x0D, 0x0A, 0x51, 0x55, 0x49, 0x54, 0x0A, 0x20, 0x00, 0x00, 0x00,
            ]
        }
    }
}

pub struct ProxyProtoPacketDialer {
    inner: Arc<dyn PacketDialer>,
}

impl ProxyProtoPacketDialer {
    pub fn new(inner: Arc<dyn PacketDialer>, _version: ProxyProtoVersion) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl PacketDialer for ProxyProtoPacketDialer {
    async fn dial_packet(&self, ctx: &DialContext, addr: &str) -> Result<BoxPacketConn, Error> {
        // PROXY protocol is a stream-prefix convention; datagram conversations have
        // no connection-establishment moment to prefix, so this stage is a passthrough.
        self.inner.dial_packet(ctx, addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_header_matches_expected_text() {
        let src = "10.0.0.1:4000".parse().unwrap();
        let dst = "10.0.0.2:443".parse().unwrap();
        let header = encode_proxy_header(ProxyProtoVersion::V1, Some(src), Some(dst));
        assert_eq!(header, b"PROXY TCP4 10.0.0.1 10.0.0.2 4000 443\r\n");
    }

    #[test]
    fn v2_header_has_signature_and_length() {
        let src = "10.0.0.1:4000".parse().unwrap();
        let dst = "10.0.0.2:443".parse().unwrap();
        let header = encode_proxy_header(ProxyProtoVersion::V2, Some(src), Some(dst));
        assert_eq!(&header[..12], &[0x0D, 0x0A, 0x0D, 0x0A, 0x00, 0x0D, 0x0A, 0x51, 0x55, 0x49, 0x54, 0x0A]);
        assert_eq!(header.len(), 12 + 4 + 12);
    }
}
