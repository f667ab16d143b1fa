use gnut_api::{
    headers::{self, HeaderSet},
    HandshakeResponse, HandshakeStatus,
};
use tracing::debug;

use super::{headers_set, HandshakeResponder, ResponderContext, Role};

/// Policy for a node running as an ultrapeer.
#[derive(Debug, Clone)]
pub struct UltrapeerResponder {
    ctx: ResponderContext,
}

impl UltrapeerResponder {
    pub fn new(ctx: ResponderContext) -> Self {
        Self { ctx }
    }

    fn respond_to_outgoing(&self, peer: &HandshakeResponse) -> HandshakeResponse {
        if self.ctx.locale_mismatch(peer) {
            debug!(target: "gnutd", locale = ?peer.locale_pref(), "ultrapeer: locale mismatch");
            return HandshakeResponse::reject_locale();
        }
        let status = self.ctx.services.connection_status(peer);
        if !status.is_acceptable() {
            return HandshakeResponse::reject_outgoing(status);
        }
        let mut h = HeaderSet::new();
        if peer.has_leaf_guidance()
            && self.ctx.services.is_leaf_demotion_allowed()
            && peer.is_good_ultrapeer()
        {
            debug!(target: "gnutd", "ultrapeer: accepting leaf guidance");
            h.insert(headers::X_ULTRAPEER, "False");
        }
        self.ctx.add_deflate_if_accepted(peer, &mut h);
        HandshakeResponse::accept_outgoing(h)
    }

    fn respond_to_incoming(&self, peer: &HandshakeResponse) -> HandshakeResponse {
        if peer.is_crawler() {
            return self.ctx.crawler_response();
        }
        let mut h =
            headers_set::ultrapeer_headers(&self.ctx.config, self.ctx.services.listen_addr());
        let status = self.decide(peer, &mut h);
        if !status.is_acceptable() {
            return HandshakeResponse::reject_incoming(status, &self.ctx.try_hosts(peer));
        }
        self.ctx.add_deflate_if_accepted(peer, &mut h);
        HandshakeResponse::accept_incoming(h, &self.ctx.try_hosts(peer))
    }

    /// Leaf slot first, then leaf guidance, then an ultrapeer slot. A peer
    /// that fails both is told the leaf reason when leaf slots turned it away.
    fn decide(&self, peer: &HandshakeResponse, h: &mut HeaderSet) -> HandshakeStatus {
        let services = &self.ctx.services;
        let as_leaf = services.leaf_connection_status(peer);
        if peer.is_leaf() {
            return as_leaf;
        }
        if as_leaf.is_acceptable() && !services.is_ultrapeer_needed() {
            h.insert(headers::X_ULTRAPEER_NEEDED, "false");
            return HandshakeStatus::Ok;
        }
        let as_ultrapeer = services.connection_status(peer);
        if as_ultrapeer.is_acceptable() {
            h.insert(headers::X_ULTRAPEER_NEEDED, "true");
            return HandshakeStatus::Ok;
        }
        if !as_leaf.is_acceptable() {
            as_leaf
        } else {
            as_ultrapeer
        }
    }
}

impl HandshakeResponder for UltrapeerResponder {
    fn role(&self) -> Role {
        Role::Ultrapeer
    }

    fn respond(&self, peer: &HandshakeResponse, outgoing: bool) -> HandshakeResponse {
        if outgoing {
            self.respond_to_outgoing(peer)
        } else {
            self.respond_to_incoming(peer)
        }
    }

    fn request_headers(&self) -> HeaderSet {
        headers_set::ultrapeer_headers(&self.ctx.config, self.ctx.services.listen_addr())
    }
}
