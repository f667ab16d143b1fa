use gnut_api::{HandshakeResponse, HandshakeStatus, HeaderSet};
use tracing::debug;

use super::{headers_set, HandshakeResponder, ResponderContext, Role};

/// Policy for a node running as a leaf: it only ever talks to ultrapeers.
#[derive(Debug, Clone)]
pub struct LeafResponder {
    ctx: ResponderContext,
}

impl LeafResponder {
    pub fn new(ctx: ResponderContext) -> Self {
        Self { ctx }
    }

    fn respond_to_outgoing(&self, peer: &HandshakeResponse) -> HandshakeResponse {
        if !peer.is_ultrapeer() {
            return HandshakeResponse::reject_outgoing(HandshakeStatus::WeAreLeaves);
        }
        if self.ctx.locale_mismatch(peer) {
            debug!(target: "gnutd", locale = ?peer.locale_pref(), "leaf: locale mismatch");
            return HandshakeResponse::reject_locale();
        }
        let status = self.ctx.services.connection_status(peer);
        if !status.is_acceptable() {
            return HandshakeResponse::reject_outgoing(status);
        }
        // everything else went out with the request
        let mut h = HeaderSet::new();
        self.ctx.add_deflate_if_accepted(peer, &mut h);
        HandshakeResponse::accept_outgoing(h)
    }

    fn respond_to_incoming(&self, peer: &HandshakeResponse) -> HandshakeResponse {
        if peer.is_crawler() {
            return self.ctx.crawler_response();
        }
        if !peer.is_ultrapeer() {
            return HandshakeResponse::reject_incoming(
                HandshakeStatus::WeAreLeaves,
                &self.ctx.try_hosts(peer),
            );
        }
        let mut h = headers_set::leaf_headers(&self.ctx.config, self.ctx.services.listen_addr());
        let status = self.ctx.services.connection_status(peer);
        if !status.is_acceptable() {
            return HandshakeResponse::reject_incoming(status, &self.ctx.try_hosts(peer));
        }
        self.ctx.add_deflate_if_accepted(peer, &mut h);
        HandshakeResponse::accept_incoming(h, &self.ctx.try_hosts(peer))
    }
}

impl HandshakeResponder for LeafResponder {
    fn role(&self) -> Role {
        Role::Leaf
    }

    fn respond(&self, peer: &HandshakeResponse, outgoing: bool) -> HandshakeResponse {
        if outgoing {
            self.respond_to_outgoing(peer)
        } else {
            self.respond_to_incoming(peer)
        }
    }

    fn request_headers(&self) -> HeaderSet {
        headers_set::leaf_headers(&self.ctx.config, self.ctx.services.listen_addr())
    }
}
