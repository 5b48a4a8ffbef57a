//! A SOCKS5 client that drives method negotiation, optional
//! username/password sub-negotiation, and CONNECT / UDP ASSOCIATE in a
//! single round-trip-minimizing exchange.

pub mod client;
pub mod udp;

pub use client::{Credentials, Socks5Client};
pub use udp::Socks5Association;
