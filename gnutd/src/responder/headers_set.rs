//! The header blocks this node advertises about itself.

use std::net::SocketAddr;

use gnut_api::{
    headers::{self, HeaderSet},
    HandshakeConfig,
};

const X_VERSION_VALUE: &str = env!("CARGO_PKG_VERSION");

/// Headers common to both roles. `Remote-IP` is a placeholder; the encoder
/// fills in the address of the connection it is written to.
pub fn basic_headers(cfg: &HandshakeConfig, listen: Option<SocketAddr>) -> HeaderSet {
    let mut h = HeaderSet::new();
    h.insert(headers::USER_AGENT, cfg.user_agent.as_str());
    h.insert(headers::REMOTE_IP, "");
    if let Some(addr) = listen {
        h.insert(headers::LISTEN_IP, addr.to_string());
    }
    h.insert(headers::X_QUERY_ROUTING, "0.1");
    h.insert(headers::X_ULTRAPEER_QUERY_ROUTING, "0.1");
    h.insert(headers::X_MAX_TTL, cfg.max_ttl.to_string());
    h.insert(headers::X_DYNAMIC_QUERY, "0.1");
    h.insert(headers::X_DEGREE, cfg.degree.to_string());
    h.insert(headers::X_LOCALE_PREF, cfg.language.as_str());
    h.insert(headers::GGEP, "0.5");
    h.insert(headers::X_VENDOR_MESSAGE, "0.2");
    h.insert(headers::X_GUESS, "0.1");
    h.insert(headers::X_PONG_CACHING, "0.1");
    h.insert(headers::X_REQUERIES, "false");
    h.insert(headers::X_VERSION, X_VERSION_VALUE);
    if cfg.accept_deflate {
        h.insert(headers::ACCEPT_ENCODING, headers::DEFLATE_VALUE);
    }
    h
}

pub fn leaf_headers(cfg: &HandshakeConfig, listen: Option<SocketAddr>) -> HeaderSet {
    let mut h = basic_headers(cfg, listen);
    h.insert(headers::X_ULTRAPEER, "False");
    h
}

pub fn ultrapeer_headers(cfg: &HandshakeConfig, listen: Option<SocketAddr>) -> HeaderSet {
    let mut h = basic_headers(cfg, listen);
    h.insert(headers::X_ULTRAPEER, "True");
    h.insert(headers::X_PROBE_QUERIES, "0.1");
    h
}
