pub mod handshake;
pub mod http_like;
