//! The extension point for schemes this crate treats as external
//! collaborators: Shadowsocks, TLS, TLS-fragmentation, WebSocket carriers,
//! and DoH-backed resolution. Each is a real, separately-maintained
//! library in production; this crate only needs to know how to slot one
//! in by scheme name.

use crate::compose::DialerSpec;
use crate::error::{ConfigError, Error};
use crate::transport::{PacketDialer, StreamDialer};
use std::collections::HashMap;
use std::sync::Arc;

/// Wraps an inner dialer with whatever an external scheme needs. Packet
/// wrapping has a default that rejects the scheme for packet pipelines,
/// since most of the registry's schemes (`tls`, `tlsfrag`, `doh`) are
/// meaningless for a datagram conversation.
pub trait WrapperFactory: Send + Sync {
    fn wrap_stream(&self, inner: Arc<dyn StreamDialer>, spec: &DialerSpec) -> Result<Arc<dyn StreamDialer>, Error>;

    fn wrap_packet(&self, _inner: Arc<dyn PacketDialer>, spec: &DialerSpec) -> Result<Arc<dyn PacketDialer>, Error> {
        Err(ConfigError::PacketIncompatible(spec.scheme.clone()).into())
    }
}

/// A name-keyed table of [`WrapperFactory`] implementations, consulted by
/// [`super::DialerComposer`] for any scheme it doesn't implement natively.
#[derive(Clone, Default)]
pub struct WrapperRegistry {
    factories: HashMap<String, Arc<dyn WrapperFactory>>,
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: impl Into<String>, factory: impl WrapperFactory + 'static) -> &mut Self {
        self.factories.insert(scheme.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn WrapperFactory>> {
        self.factories.get(scheme).cloned()
    }
}
