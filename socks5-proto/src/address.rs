use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Cursor, Error as IoError},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    vec,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The SOCKS5 address trailer: `ATYP || ADDR || PORT`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Address {
    SocketAddress(SocketAddr),
    DomainAddress(String, u16),
}

/// Errors raised while parsing, encoding, or decoding a [`Address`].
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("domain name {0:?} is {1} bytes long, exceeding the 255-byte limit")]
    DomainNameTooLong(String, usize),
    #[error("{0:?} is not a valid host:port address")]
    InvalidAddress(String),
    #[error("unsupported address type {0:#04x}")]
    InvalidType(u8),
    #[error(transparent)]
    Io(#[from] IoError),
}

impl Address {
    const ATYP_IPV4: u8 = 0x01;
    const ATYP_FQDN: u8 = 0x03;
    const ATYP_IPV6: u8 = 0x04;

    pub fn unspecified() -> Self {
        Address::SocketAddress(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
    }

    /// Parses a `host:port` string, preferring a literal IPv4/IPv6 address
    /// and falling back to a domain name. IPv6 literals use the bracketed
    /// `[addr]:port` form.
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
            return Ok(Self::SocketAddress(socket_addr));
        }

        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| AddressError::InvalidAddress(addr.to_owned()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidAddress(addr.to_owned()))?;

        if host.is_empty() || host.len() > u8::MAX as usize {
            return Err(AddressError::DomainNameTooLong(host.to_owned(), host.len()));
        }

        Ok(Self::DomainAddress(host.to_owned(), port))
    }

    pub fn to_socket_addr(&self) -> Result<SocketAddr, AddressError> {
        match self {
            Address::SocketAddress(addr) => Ok(*addr),
            Address::DomainAddress(addr, port) => {
                if let Ok(addr) = addr.parse::<Ipv4Addr>() {
                    Ok(SocketAddr::from((addr, *port)))
                } else if let Ok(addr) = addr.parse::<Ipv6Addr>() {
                    Ok(SocketAddr::from((addr, *port)))
                } else {
                    Err(AddressError::InvalidAddress(format!("{addr}:{port}")))
                }
            }
        }
    }

    pub async fn read_from<R>(stream: &mut R) -> Result<Self, AddressError>
    where
        R: AsyncRead + Unpin,
    {
        let atyp = stream.read_u8().await?;

        match atyp {
            Self::ATYP_IPV4 => {
                let mut buf = [0; 6];
                stream.read_exact(&mut buf).await?;
                let mut rdr = Cursor::new(buf);

                let addr = Ipv4Addr::new(
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                );

                let port = ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap();

                Ok(Self::SocketAddress(SocketAddr::from((addr, port))))
            }
            Self::ATYP_FQDN => {
                let len = stream.read_u8().await? as usize;

                let mut buf = vec![0; len + 2];
                stream.read_exact(&mut buf).await?;

                let port = ReadBytesExt::read_u16::<BigEndian>(&mut &buf[len..]).unwrap();
                buf.truncate(len);

                let addr = String::from_utf8(buf)
                    .map_err(|err| AddressError::InvalidAddress(err.to_string()))?;

                Ok(Self::DomainAddress(addr, port))
            }
            Self::ATYP_IPV6 => {
                let mut buf = [0; 18];
                stream.read_exact(&mut buf).await?;
                let mut rdr = Cursor::new(buf);

                let addr = Ipv6Addr::new(
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                );

                let port = ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap();

                Ok(Self::SocketAddress(SocketAddr::from((addr, port))))
            }
            atyp => Err(AddressError::InvalidType(atyp)),
        }
    }

    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        match self {
            Self::SocketAddress(addr) => match addr {
                SocketAddr::V4(addr) => {
                    buf.put_u8(Self::ATYP_IPV4);
                    buf.put_slice(&addr.ip().octets());
                    buf.put_u16(addr.port());
                }
                SocketAddr::V6(addr) => {
                    buf.put_u8(Self::ATYP_IPV6);
                    for seg in addr.ip().segments() {
                        buf.put_u16(seg);
                    }
                    buf.put_u16(addr.port());
                }
            },
            Self::DomainAddress(addr, port) => {
                buf.put_u8(Self::ATYP_FQDN);
                buf.put_u8(addr.len() as u8);
                buf.put_slice(addr.as_bytes());
                buf.put_u16(*port);
            }
        }
    }

    pub fn serialized_len(&self) -> usize {
        1 + match self {
            Address::SocketAddress(addr) => match addr {
                SocketAddr::V4(_) => 6,
                SocketAddr::V6(_) => 18,
            },
            Address::DomainAddress(addr, _) => 1 + addr.len() + 2,
        }
    }

    pub const fn max_serialized_len() -> usize {
        1 + 1 + u8::MAX as usize + 2
    }
}

/// Encodes `addr` (a `host:port` string) as a SOCKS5 address trailer, appending it to `buf`.
pub fn encode<B: BufMut>(buf: &mut B, addr: &str) -> Result<(), AddressError> {
    Address::parse(addr)?.write_to_buf(buf);
    Ok(())
}

/// Reads a SOCKS5 address trailer from `reader`, returning its `host:port` rendering
/// and the number of bytes consumed.
pub async fn decode<R>(reader: &mut R) -> Result<(String, usize), AddressError>
where
    R: AsyncRead + Unpin,
{
    let address = Address::read_from(reader).await?;
    let len = address.serialized_len();
    Ok((address.to_string(), len))
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Address::DomainAddress(hostname, port) => write!(f, "{hostname}:{port}"),
            Address::SocketAddress(socket_addr) => write!(f, "{socket_addr}"),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::SocketAddress(addr)
    }
}

impl From<(Ipv4Addr, u16)> for Address {
    fn from((addr, port): (Ipv4Addr, u16)) -> Self {
        Address::SocketAddress(SocketAddr::from((addr, port)))
    }
}

impl From<(Ipv6Addr, u16)> for Address {
    fn from((addr, port): (Ipv6Addr, u16)) -> Self {
        Address::SocketAddress(SocketAddr::from((addr, port)))
    }
}

impl From<(String, u16)> for Address {
    fn from((addr, port): (String, u16)) -> Self {
        Address::DomainAddress(addr, port)
    }
}

impl From<(&str, u16)> for Address {
    fn from((addr, port): (&str, u16)) -> Self {
        Address::DomainAddress(addr.to_owned(), port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert_eq;

    #[test]
    fn parse_ipv4() {
        let addr = Address::parse("8.8.8.8:853").unwrap();
        assert_eq!(addr, Address::SocketAddress("8.8.8.8:853".parse().unwrap()));
    }

    #[test]
    fn parse_ipv6_bracketed() {
        let addr = Address::parse("[2001:4860:4860::8888]:853").unwrap();
        assert_eq!(
            addr,
            Address::SocketAddress("[2001:4860:4860::8888]:853".parse().unwrap())
        );
    }

    #[test]
    fn parse_domain() {
        let addr = Address::parse("dns.google:853").unwrap();
        assert_eq!(addr, Address::DomainAddress("dns.google".to_owned(), 853));
    }

    #[test]
    fn parse_rejects_oversized_domain() {
        let name = "a".repeat(256);
        let err = Address::parse(&format!("{name}:80")).unwrap_err();
        assert!(matches!(err, AddressError::DomainNameTooLong(_, 256)));
    }

    #[tokio::test]
    async fn encode_ipv4_matches_scenario_s1() {
        let mut buf = Vec::new();
        encode(&mut buf, "8.8.8.8:853").unwrap();
        assert_eq!(buf, [0x01, 8, 8, 8, 8, 0x03, 0x55]);
    }

    #[tokio::test]
    async fn encode_domain_matches_scenario_s2() {
        let mut buf = Vec::new();
        encode(&mut buf, "dns.google:853").unwrap();
        let mut expected = vec![0x03, 0x0A];
        expected.extend_from_slice(b"dns.google");
        expected.extend_from_slice(&[0x03, 0x55]);
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn encode_ipv6_matches_scenario_s3() {
        let mut buf = Vec::new();
        encode(&mut buf, "[2001:4860:4860::8888]:853").unwrap();
        assert_eq!(
            buf,
            [
                0x04, 0x20, 0x01, 0x48, 0x60, 0x48, 0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x88, 0x88, 0x03, 0x55
            ]
        );
    }

    #[tokio::test]
    async fn round_trip_every_encodable_address() {
        for input in [
            "8.8.8.8:853",
            "[2001:4860:4860::8888]:853",
            "dns.google:853",
            "0.0.0.0:0",
        ] {
            let mut buf = Vec::new();
            encode(&mut buf, input).unwrap();
            let (decoded, consumed) = decode(&mut Cursor::new(buf.clone())).await.unwrap();
            assert_eq!(consumed, buf.len());
            assert_eq!(decoded, input);
        }
    }

    proptest::proptest! {
        #[test]
        fn round_trip_ipv4(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255, port in 0u16..=65535) {
            let input = format!("{a}.{b}.{c}.{d}:{port}");
            let mut buf = Vec::new();
            encode(&mut buf, &input).unwrap();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let decoded = rt.block_on(decode(&mut Cursor::new(buf))).unwrap().0;
            prop_assert_eq!(decoded, input);
        }

        #[test]
        fn round_trip_domain(label in "[a-z]{1,20}", port in 0u16..=65535) {
            let input = format!("{label}.example:{port}");
            let mut buf = Vec::new();
            encode(&mut buf, &input).unwrap();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let decoded = rt.block_on(decode(&mut Cursor::new(buf))).unwrap().0;
            prop_assert_eq!(decoded, input);
        }
    }
}
