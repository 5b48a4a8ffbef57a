use crate::context::DialContext;
use crate::error::{AuthError, ConfigError, Error, ProtocolError, ReplyError};
use crate::socks5::udp::Socks5Association;
use crate::transport::{BoxPacketConn, BoxStreamConn, PacketDialer, StreamConn, StreamEndpoint};
use async_trait::async_trait;
use bytes::BytesMut;
use socks5_proto::{handshake, Address, Command, Reply, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::instrument;

/// A username/password pair for RFC 1929 sub-negotiation. Both fields must
/// be 1 to 255 bytes; the SOCKS5 wire format has no way to express more.
#[derive(Clone, Debug)]
pub struct Credentials {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl Credentials {
    pub fn new(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let username = username.into();
        let password = password.into();
        for (field, value) in [("username", &username), ("password", &password)] {
            if value.is_empty() || value.len() > u8::MAX as usize {
                return Err(ConfigError::OutOfRange {
                    spec: "socks5 credentials".into(),
                    detail: format!("{field} must be 1 to 255 bytes, got {}", value.len()),
                });
            }
        }
        Ok(Self { username, password })
    }
}

/// Drives the SOCKS5 handshake over a proxy control channel, exposing
/// `dial_stream` (CONNECT) and, when a [`PacketDialer`] is injected,
/// `dial_packet` (UDP ASSOCIATE).
pub struct Socks5Client<E> {
    proxy: E,
    credentials: Option<Credentials>,
    packet_dialer: Option<Box<dyn PacketDialer>>,
}

impl<E: StreamEndpoint> Socks5Client<E> {
    pub fn new(proxy: E) -> Self {
        Self { proxy, credentials: None, packet_dialer: None }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_packet_dialer(mut self, dialer: impl PacketDialer + 'static) -> Self {
        self.packet_dialer = Some(Box::new(dialer));
        self
    }

    fn offered_method(&self) -> handshake::Method {
        if self.credentials.is_some() {
            handshake::Method::PASSWORD
        } else {
            handshake::Method::NONE
        }
    }

    /// Performs the combined method-select / auth / request handshake in a
    /// single write, then reads back the method, optional auth status, and
    /// request reply in the order the protocol dictates. Returns the bound
    /// address from the reply on success.
    #[instrument(skip(self, stream), fields(command = ?command))]
    async fn handshake<S>(&self, ctx: &DialContext, stream: &mut S, command: Command, target: &str) -> Result<Address, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let method = self.offered_method();
        let target_addr = Address::parse(target)?;

        let mut buf = BytesMut::new();
        handshake::Request::new(vec![method]).write_to_buf(&mut buf);
        if let Some(creds) = &self.credentials {
            handshake::password::Request::new(creds.username.clone(), creds.password.clone()).write_to_buf(&mut buf);
        }
        Request::new(command, target_addr).write_to_buf(&mut buf);

        ctx.race(stream.write_all(&buf)).await??;

        let selected = ctx.race(handshake::Response::read_from(stream)).await??;
        if selected.method != method {
            return Err(ProtocolError::MethodMismatch { offered: vec![method], selected: selected.method }.into());
        }

        if self.credentials.is_some() {
            let auth = ctx.race(handshake::password::Response::read_from(stream)).await??;
            if !auth.status {
                return Err(AuthError.into());
            }
        }

        let response = ctx.race(Response::read_from(stream)).await??;
        if response.reply != Reply::Succeeded {
            return Err(ReplyError::from_code(u8::from(response.reply)).into());
        }

        Ok(response.address)
    }
}

#[async_trait]
impl<E: StreamEndpoint> crate::transport::StreamDialer for Socks5Client<E> {
    async fn dial_stream(&self, ctx: &DialContext, addr: &str) -> Result<BoxStreamConn, Error> {
        let mut stream = self.proxy.connect(ctx).await?;
        match self.handshake(ctx, &mut stream, Command::Connect, addr).await {
            Ok(_bound) => Ok(stream),
            Err(err) => {
                let _ = stream.shutdown().await;
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<E: StreamEndpoint> PacketDialer for Socks5Client<E> {
    async fn dial_packet(&self, ctx: &DialContext, addr: &str) -> Result<BoxPacketConn, Error> {
        let packet_dialer = self.packet_dialer.as_deref().ok_or_else(|| {
            ConfigError::PacketIncompatible("socks5 client has no packet dialer configured for UDP relay".into())
        })?;

        let mut ctrl = self.proxy.connect(ctx).await?;
        let bound = match self.handshake(ctx, &mut ctrl, Command::Associate, "0.0.0.0:0").await {
            Ok(bound) => bound,
            Err(err) => {
                let _ = ctrl.shutdown().await;
                return Err(err);
            }
        };

        let relay_addr = match resolve_relay_addr(&bound, ctrl.as_ref()) {
            Ok(addr) => addr,
            Err(err) => {
                let _ = ctrl.shutdown().await;
                return Err(err);
            }
        };

        let relay = match packet_dialer.dial_packet(ctx, &relay_addr.to_string()).await {
            Ok(relay) => relay,
            Err(err) => {
                let _ = ctrl.shutdown().await;
                return Err(err);
            }
        };

        let target = Address::parse(addr)?;
        Ok(Box::new(Socks5Association::new(ctrl, relay, target)))
    }
}

fn resolve_relay_addr(bound: &Address, ctrl: &dyn StreamConn) -> Result<std::net::SocketAddr, Error> {
    let bound = bound.to_socket_addr()?;
    if bound.ip().is_unspecified() {
        let proxy_ip = ctrl.peer_addr()?.ip();
        Ok(std::net::SocketAddr::new(proxy_ip, bound.port()))
    } else {
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectStreamDialer;
    use crate::transport::FixedStreamEndpoint;

    fn endpoint() -> FixedStreamEndpoint<DirectStreamDialer> {
        FixedStreamEndpoint::new(DirectStreamDialer, "127.0.0.1:1")
    }

    #[test]
    fn credentials_reject_empty_username() {
        let err = Credentials::new(Vec::new(), b"pw".to_vec()).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn credentials_reject_oversized_password() {
        let err = Credentials::new(b"user".to_vec(), vec![0u8; 256]).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[tokio::test]
    async fn connect_no_auth_matches_scenario_s6() {
        let mut mock = tokio_test::io::Builder::new()
            .write(&[0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x03, 0x0B, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm', 0x01, 0xBB])
            .read(&[0x05, 0x00])
            .read(&[0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
            .build();

        let client = Socks5Client::new(endpoint());
        let ctx = DialContext::none();
        let bound = client.handshake(&ctx, &mut mock, Command::Connect, "example.com:443").await.unwrap();
        assert_eq!(bound.to_string(), "0.0.0.0:0");
    }

    #[tokio::test]
    async fn connect_reply_error_matches_scenario_s7() {
        let mut mock = tokio_test::io::Builder::new()
            .write(&[0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x03, 0x0B, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm', 0x01, 0xBB])
            .read(&[0x05, 0x00])
            .read(&[0x05, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
            .build();

        let client = Socks5Client::new(endpoint());
        let ctx = DialContext::none();
        let err = client.handshake(&ctx, &mut mock, Command::Connect, "example.com:443").await.unwrap_err();
        match err {
            Error::Reply(reply_err) => assert_eq!(reply_err.code, 0x05),
            other => panic!("expected ReplyError, got {other:?}"),
        }
    }
}
