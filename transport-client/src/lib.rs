//! Client-side dialing primitives for a composable circumvention transport:
//! a SOCKS5 client (stream CONNECT and UDP ASSOCIATE), a write-flush
//! splitter, and a pipeline composer that strings both together with
//! external wrapper schemes by configuration alone.
//!
//! The crate has no notion of a "default" transport: callers either dial
//! directly ([`direct::DirectStreamDialer`] / [`direct::DirectPacketDialer`])
//! or describe a pipeline and let [`compose::DialerComposer`] build it.

pub mod compose;
pub mod context;
pub mod direct;
pub mod error;
pub mod pool;
pub mod socks5;
pub mod split;
pub mod transport;

pub use compose::{DialerComposer, DialerSpec, PipelineSpec, WrapperFactory, WrapperRegistry};
pub use context::DialContext;
pub use direct::{DirectPacketDialer, DirectStreamDialer};
pub use error::{ConfigError, Error, ProtocolError, ReplyError, ReplyErrorKind, TransportError};
pub use socks5::{Credentials, Socks5Association, Socks5Client};
pub use split::{fixed, repeated, SplitSchedule, SplitWriter};
pub use transport::{
    BoxPacketConn, BoxStreamConn, FixedPacketEndpoint, FixedStreamEndpoint, PacketConn, PacketDialer, PacketEndpoint, StreamConn,
    StreamDialer, StreamEndpoint,
};
