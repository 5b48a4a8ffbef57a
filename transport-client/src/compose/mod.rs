//! Parses and builds pipelines of the form `scheme:opaque?query|scheme:opaque`,
//! leftmost spec innermost. `DialerComposer` folds a parsed pipeline into a
//! `StreamDialer`/`PacketDialer` chain, using this crate's built-in stages
//! directly and deferring to a [`WrapperRegistry`] for schemes it doesn't
//! implement itself.

pub mod registry;
pub mod schemes;

pub use registry::{WrapperFactory, WrapperRegistry};

use crate::direct::{DirectPacketDialer, DirectStreamDialer};
use crate::error::{ConfigError, Error};
use crate::socks5::client::{Credentials, Socks5Client};
use crate::transport::{FixedStreamEndpoint, PacketDialer, StreamDialer};
use std::sync::Arc;

const STREAM_ONLY_SCHEMES: &[&str] = &["split", "tls", "tlsfrag", "doh"];

/// Every scheme name §4.4 recognizes, whether or not a [`WrapperRegistry`]
/// factory is currently registered for it. Sanitisation treats these as
/// "known" regardless of registration; only genuinely unrecognized scheme
/// names collapse to `scheme://UNKNOWN`.
const RECOGNIZED_SCHEMES: &[&str] = &["socks5", "split", "ss", "tls", "tlsfrag", "override", "doh", "ws", "proxyproto"];

/// One `scheme:opaque?query` token of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialerSpec {
    pub scheme: String,
    pub opaque: String,
    pub query: Option<String>,
}

/// A fully parsed `|`-delimited pipeline, innermost spec first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineSpec {
    pub specs: Vec<DialerSpec>,
}

impl PipelineSpec {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::default());
        }
        let specs = input.split('|').map(parse_spec).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { specs })
    }

    /// A log-safe rendering: known schemes that carry credentials have their
    /// user-info redacted, schemes this registry doesn't recognize are
    /// collapsed to `scheme://UNKNOWN` so nothing unparsed leaks verbatim.
    pub fn sanitize(&self, registry: &WrapperRegistry) -> String {
        self.specs.iter().map(|spec| sanitize_spec(spec, registry)).collect::<Vec<_>>().join("|")
    }
}

fn sanitize_spec(spec: &DialerSpec, _registry: &WrapperRegistry) -> String {
    if !RECOGNIZED_SCHEMES.contains(&spec.scheme.as_str()) {
        return format!("{}://UNKNOWN", spec.scheme);
    }
    let opaque = match spec.scheme.as_str() {
        "socks5" | "ss" => match spec.opaque.split_once('@') {
            Some((_userinfo, hostport)) => format!("REDACTED@{hostport}"),
            None => spec.opaque.clone(),
        },
        _ => spec.opaque.clone(),
    };
    match &spec.query {
        Some(query) => format!("{}:{opaque}?{query}", spec.scheme),
        None => format!("{}:{opaque}", spec.scheme),
    }
}

fn parse_spec(token: &str) -> Result<DialerSpec, ConfigError> {
    let token = token.trim();
    let (scheme, rest) = token.split_once(':').ok_or_else(|| ConfigError::Malformed(token.to_string()))?;
    let scheme = scheme.trim();
    if !is_valid_scheme(scheme) {
        return Err(ConfigError::Malformed(token.to_string()));
    }
    let (opaque, query) = match rest.split_once('?') {
        Some((opaque, query)) => (opaque.to_string(), Some(query.to_string())),
        None => (rest.to_string(), None),
    };
    Ok(DialerSpec { scheme: scheme.to_lowercase(), opaque, query })
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn query_value<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn parse_socks5_opaque(opaque: &str) -> Result<(Option<Credentials>, String), Error> {
    match opaque.split_once('@') {
        Some((userinfo, hostport)) => {
            let (user, pass) = userinfo
                .split_once(':')
                .ok_or_else(|| ConfigError::Malformed(format!("socks5 user-info missing ':': {userinfo}")))?;
            let creds = Credentials::new(user.as_bytes().to_vec(), pass.as_bytes().to_vec())?;
            Ok((Some(creds), hostport.to_string()))
        }
        None => Ok((None, opaque.to_string())),
    }
}

fn parse_split_n(spec: &DialerSpec) -> Result<usize, ConfigError> {
    spec.opaque.parse::<usize>().map_err(|_| ConfigError::OutOfRange {
        spec: format!("split:{}", spec.opaque),
        detail: "N must be a non-negative integer byte count".into(),
    })
}

fn parse_proxyproto_version(spec: &DialerSpec) -> Result<schemes::ProxyProtoVersion, ConfigError> {
    let version = spec.query.as_deref().and_then(|q| query_value(q, "version")).unwrap_or("1");
    match version {
        "1" => Ok(schemes::ProxyProtoVersion::V1),
        "2" => Ok(schemes::ProxyProtoVersion::V2),
        other => Err(ConfigError::OutOfRange {
            spec: format!("proxyproto:{}?version={other}", spec.opaque),
            detail: "version must be 1 or 2".into(),
        }),
    }
}

/// Folds a [`PipelineSpec`] into a ready-to-use dialer.
pub struct DialerComposer<'a> {
    registry: &'a WrapperRegistry,
}

impl<'a> DialerComposer<'a> {
    pub fn new(registry: &'a WrapperRegistry) -> Self {
        Self { registry }
    }

    pub fn build_stream(&self, pipeline: &PipelineSpec) -> Result<Arc<dyn StreamDialer>, Error> {
        let (stream, _packet) = self.fold(pipeline, false)?;
        Ok(stream)
    }

    pub fn build_packet(&self, pipeline: &PipelineSpec) -> Result<Arc<dyn PacketDialer>, Error> {
        let (_stream, packet) = self.fold(pipeline, true)?;
        packet.ok_or_else(|| ConfigError::PacketIncompatible("pipeline has no UDP-capable dialer at its outermost stage".into()).into())
    }

    fn fold(&self, pipeline: &PipelineSpec, want_packet: bool) -> Result<(Arc<dyn StreamDialer>, Option<Arc<dyn PacketDialer>>), Error> {
        let mut stream: Arc<dyn StreamDialer> = Arc::new(DirectStreamDialer);
        let mut packet: Option<Arc<dyn PacketDialer>> = Some(Arc::new(DirectPacketDialer));

        for spec in &pipeline.specs {
            if want_packet && STREAM_ONLY_SCHEMES.contains(&spec.scheme.as_str()) {
                return Err(ConfigError::PacketIncompatible(spec.scheme.clone()).into());
            }

            match spec.scheme.as_str() {
                "socks5" => {
                    let (creds, proxy_addr) = parse_socks5_opaque(&spec.opaque)?;
                    let endpoint = FixedStreamEndpoint::new(Arc::clone(&stream), proxy_addr);
                    let mut client = Socks5Client::new(endpoint);
                    if let Some(creds) = creds {
                        client = client.with_credentials(creds);
                    }
                    if let Some(p) = packet.take() {
                        client = client.with_packet_dialer(p);
                    }
                    let client = Arc::new(client);
                    packet = Some(client.clone() as Arc<dyn PacketDialer>);
                    stream = client as Arc<dyn StreamDialer>;
                }
                "split" => {
                    let n = parse_split_n(spec)?;
                    stream = Arc::new(schemes::SplitStreamDialer::new(Arc::clone(&stream), n));
                    packet = None;
                }
                "override" => {
                    stream = Arc::new(schemes::OverrideStreamDialer::new(Arc::clone(&stream), spec.opaque.clone()));
                    packet = packet.map(|p| Arc::new(schemes::OverridePacketDialer::new(p, spec.opaque.clone())) as Arc<dyn PacketDialer>);
                }
                "proxyproto" => {
                    let version = parse_proxyproto_version(spec)?;
                    stream = Arc::new(schemes::ProxyProtoStreamDialer::new(Arc::clone(&stream), version));
                    packet = packet.map(|p| Arc::new(schemes::ProxyProtoPacketDialer::new(p, version)) as Arc<dyn PacketDialer>);
                }
                other => {
                    let factory = self.registry.get(other).ok_or_else(|| ConfigError::UnlinkedScheme(other.to_string()))?;
                    stream = factory.wrap_stream(Arc::clone(&stream), spec)?;
                    packet = match packet {
                        Some(p) => factory.wrap_packet(p, spec).ok(),
                        None => None,
                    };
                }
            }
        }

        Ok((stream, packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pipeline_parses_to_no_specs() {
        let pipeline = PipelineSpec::parse("").unwrap();
        assert!(pipeline.specs.is_empty());
    }

    #[test]
    fn scheme_must_start_with_a_letter() {
        let err = PipelineSpec::parse("2split:4").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn spec_without_colon_is_malformed() {
        let err = PipelineSpec::parse("split").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn multi_stage_pipeline_parses_in_order() {
        let pipeline = PipelineSpec::parse("split:2|override:10.0.0.1:9000").unwrap();
        assert_eq!(pipeline.specs.len(), 2);
        assert_eq!(pipeline.specs[0].scheme, "split");
        assert_eq!(pipeline.specs[0].opaque, "2");
        assert_eq!(pipeline.specs[1].scheme, "override");
        assert_eq!(pipeline.specs[1].opaque, "10.0.0.1:9000");
    }

    #[test]
    fn proxyproto_version_query_is_parsed() {
        let pipeline = PipelineSpec::parse("proxyproto:?version=2").unwrap();
        let spec = &pipeline.specs[0];
        assert_eq!(parse_proxyproto_version(spec).unwrap(), schemes::ProxyProtoVersion::V2);
    }

    #[test]
    fn unknown_scheme_without_registry_entry_is_rejected() {
        let registry = WrapperRegistry::new();
        let composer = DialerComposer::new(&registry);
        let pipeline = PipelineSpec::parse("ss:user:pass@h:p").unwrap();
        let err = match composer.build_stream(&pipeline) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::Config(ConfigError::UnlinkedScheme(scheme)) if scheme == "ss"));
    }

    #[test]
    fn split_scheme_rejected_in_packet_pipeline() {
        let registry = WrapperRegistry::new();
        let composer = DialerComposer::new(&registry);
        let pipeline = PipelineSpec::parse("split:2").unwrap();
        let err = match composer.build_packet(&pipeline) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::Config(ConfigError::PacketIncompatible(_))));
    }

    #[test]
    fn sanitize_redacts_socks5_userinfo() {
        let registry = WrapperRegistry::new();
        let pipeline = PipelineSpec::parse("socks5:alice:s3cret@proxy.example:1080").unwrap();
        assert_eq!(pipeline.sanitize(&registry), "socks5:REDACTED@proxy.example:1080");
    }

    #[test]
    fn sanitize_collapses_unrecognized_scheme() {
        let registry = WrapperRegistry::new();
        let pipeline = PipelineSpec::parse("quic:chacha20@h:p").unwrap();
        assert_eq!(pipeline.sanitize(&registry), "quic://UNKNOWN");
    }

    #[test]
    fn sanitize_redacts_ss_userinfo_even_without_registration() {
        let registry = WrapperRegistry::new();
        let pipeline = PipelineSpec::parse("ss:chacha20:key@h:p").unwrap();
        assert_eq!(pipeline.sanitize(&registry), "ss:REDACTED@h:p");
    }

    #[test]
    fn direct_pipeline_builds_stream_dialer() {
        let registry = WrapperRegistry::new();
        let composer = DialerComposer::new(&registry);
        let pipeline = PipelineSpec::parse("").unwrap();
        assert!(composer.build_stream(&pipeline).is_ok());
    }
}
