#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use gnut_api::{headers, HandshakeConfig, HandshakeResponse, HandshakeStatus, HeaderSet};
use gnutd::{
    responder::{make_responder, HandshakeResponder, Role},
    services::HandshakeServices,
};

/// Canned answers for every slot and directory question.
#[derive(Debug, Clone)]
pub struct FakeServices {
    pub ultrapeer: bool,
    pub status: HandshakeStatus,
    pub leaf_status: HandshakeStatus,
    pub ultrapeer_needed: bool,
    pub demotion_allowed: bool,
    pub hosts: Vec<SocketAddr>,
    pub leaves: Vec<SocketAddr>,
    pub ultrapeers: Vec<SocketAddr>,
    pub listen: Option<SocketAddr>,
}

impl Default for FakeServices {
    fn default() -> Self {
        Self {
            ultrapeer: false,
            status: HandshakeStatus::Ok,
            leaf_status: HandshakeStatus::Ok,
            ultrapeer_needed: true,
            demotion_allowed: false,
            hosts: vec![addr("1.2.3.4:6346"), addr("5.6.7.8:6347")],
            leaves: vec![addr("192.168.0.2:6346")],
            ultrapeers: vec![addr("192.168.0.3:6346")],
            listen: Some(addr("10.0.0.1:6346")),
        }
    }
}

impl HandshakeServices for FakeServices {
    fn is_ultrapeer(&self) -> bool {
        self.ultrapeer
    }

    fn connection_status(&self, _peer: &HandshakeResponse) -> HandshakeStatus {
        self.status
    }

    fn leaf_connection_status(&self, _peer: &HandshakeResponse) -> HandshakeStatus {
        self.leaf_status
    }

    fn is_ultrapeer_needed(&self) -> bool {
        self.ultrapeer_needed
    }

    fn is_leaf_demotion_allowed(&self) -> bool {
        self.demotion_allowed
    }

    fn available_hosts(&self, _ultrapeers: bool, _locale: &str, count: usize) -> Vec<SocketAddr> {
        self.hosts.iter().take(count).copied().collect()
    }

    fn leaf_nodes(&self) -> Vec<SocketAddr> {
        self.leaves.clone()
    }

    fn ultrapeer_nodes(&self) -> Vec<SocketAddr> {
        self.ultrapeers.clone()
    }

    fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen
    }
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub fn config() -> Arc<HandshakeConfig> {
    Arc::new(HandshakeConfig::default())
}

pub fn responder(role: Role, services: FakeServices) -> Arc<dyn HandshakeResponder> {
    make_responder(role, config(), Arc::new(services))
}

pub fn peer(pairs: &[(&str, &str)]) -> HandshakeResponse {
    HandshakeResponse::new(pairs.iter().copied().collect::<HeaderSet>())
}

pub fn good_ultrapeer_pairs() -> Vec<(&'static str, &'static str)> {
    vec![
        (headers::X_ULTRAPEER, "True"),
        (headers::X_DEGREE, "32"),
        (headers::X_ULTRAPEER_QUERY_ROUTING, "0.1"),
        (headers::X_MAX_TTL, "3"),
        (headers::X_DYNAMIC_QUERY, "0.1"),
    ]
}
