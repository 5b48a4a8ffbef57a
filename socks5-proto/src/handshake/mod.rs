//! This module contains the implementation of SOCKS5 protocol handshake.

mod method;
mod request;
mod response;

pub mod password;

pub use self::{method::Method, request::Request, response::HandshakeResponse as Response};
