mod auth_switch;
mod handshake;
mod handshake_response;
mod ssl_request;

pub(crate) use auth_switch::{AuthMoreData, AuthSwitchRequest};
pub(crate) use handshake::Handshake;
pub(crate) use handshake_response::HandshakeResponse;
pub(crate) use ssl_request::SslRequest;
