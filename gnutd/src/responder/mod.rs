use std::{fmt, net::SocketAddr, str::FromStr, sync::Arc};

use gnut_api::{
    headers::{self, HeaderSet},
    response::NUM_X_TRY_ULTRAPEER_HOSTS,
    HandshakeConfig, HandshakeResponse,
};

use crate::services::HandshakeServices;

pub mod headers_set;
pub mod leaf;
pub mod ultrapeer;

/// Local policy for one side of a handshake.
///
/// `respond` maps what the peer sent to what we send back. `outgoing` is true
/// when we dialed the peer and are answering its response to our request; it is
/// false when we are answering a request the peer opened.
/// Implementations are shared across connections.
pub trait HandshakeResponder: Send + Sync {
    fn role(&self) -> Role;

    fn respond(&self, peer: &HandshakeResponse, outgoing: bool) -> HandshakeResponse;

    /// Headers sent with the `GNUTELLA CONNECT/0.6` line of a connection we dial.
    fn request_headers(&self) -> HeaderSet;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Leaf,
    Ultrapeer,
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leaf" => Ok(Role::Leaf),
            "ultrapeer" | "up" => Ok(Role::Ultrapeer),
            other => Err(anyhow::anyhow!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Leaf => "leaf",
            Role::Ultrapeer => "ultrapeer",
        })
    }
}

/// Select a responder implementation by role.
///
/// An ultrapeer may later be demoted, so it gets a [`SwitchingResponder`]
/// that follows the current role reported by `services`.
pub fn make_responder(
    role: Role,
    config: Arc<HandshakeConfig>,
    services: Arc<dyn HandshakeServices>,
) -> Arc<dyn HandshakeResponder> {
    let ctx = ResponderContext { config, services };
    match role {
        Role::Leaf => Arc::new(leaf::LeafResponder::new(ctx)),
        Role::Ultrapeer => Arc::new(SwitchingResponder::new(ctx)),
    }
}

/// Dispatches each call to the ultrapeer or leaf policy according to
/// [`HandshakeServices::is_ultrapeer`] at the time of the call.
#[derive(Debug, Clone)]
pub struct SwitchingResponder {
    ctx: ResponderContext,
    leaf: leaf::LeafResponder,
    ultrapeer: ultrapeer::UltrapeerResponder,
}

impl SwitchingResponder {
    pub fn new(ctx: ResponderContext) -> Self {
        Self {
            leaf: leaf::LeafResponder::new(ctx.clone()),
            ultrapeer: ultrapeer::UltrapeerResponder::new(ctx.clone()),
            ctx,
        }
    }

    fn current(&self) -> &dyn HandshakeResponder {
        if self.ctx.services.is_ultrapeer() {
            &self.ultrapeer
        } else {
            &self.leaf
        }
    }
}

impl HandshakeResponder for SwitchingResponder {
    fn role(&self) -> Role {
        self.current().role()
    }

    fn respond(&self, peer: &HandshakeResponse, outgoing: bool) -> HandshakeResponse {
        self.current().respond(peer, outgoing)
    }

    fn request_headers(&self) -> HeaderSet {
        self.current().request_headers()
    }
}

/// Settings and collaborators both roles consult.
#[derive(Clone)]
pub struct ResponderContext {
    pub config: Arc<HandshakeConfig>,
    pub services: Arc<dyn HandshakeServices>,
}

impl ResponderContext {
    /// True when locale preferencing is on and the peer's locale is not ours.
    pub(crate) fn locale_mismatch(&self, peer: &HandshakeResponse) -> bool {
        self.config.locale_preferencing
            && peer.locale_pref_or(&self.config.default_locale) != self.config.language
    }

    pub(crate) fn try_hosts(&self, peer: &HandshakeResponse) -> Vec<SocketAddr> {
        self.services.available_hosts(
            peer.is_ultrapeer(),
            peer.locale_pref_or(&self.config.default_locale),
            NUM_X_TRY_ULTRAPEER_HOSTS,
        )
    }

    pub(crate) fn crawler_response(&self) -> HandshakeResponse {
        HandshakeResponse::crawler(
            &self.config.user_agent,
            self.services.is_ultrapeer(),
            &self.services.leaf_nodes(),
            &self.services.ultrapeer_nodes(),
        )
    }

    pub(crate) fn add_deflate_if_accepted(&self, peer: &HandshakeResponse, h: &mut HeaderSet) {
        if peer.is_deflate_accepted(self.config.encode_deflate) {
            h.insert(headers::CONTENT_ENCODING, headers::DEFLATE_VALUE);
        }
    }
}

impl fmt::Debug for ResponderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponderContext").field("config", &self.config).finish_non_exhaustive()
    }
}
