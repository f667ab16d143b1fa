use std::net::SocketAddr;

use gnut_api::{config::parse_env_bool, HandshakeResponse, HandshakeStatus};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::responder::Role;

/// Everything the responders need to know about the rest of the node.
///
/// Shared read-mostly by every connection's handshake, so implementations must
/// be safe to call concurrently.
pub trait HandshakeServices: Send + Sync {
    /// Local role right now. May change after a demotion.
    fn is_ultrapeer(&self) -> bool;

    /// Whether `peer` may take a connection slot in its declared role.
    fn connection_status(&self, peer: &HandshakeResponse) -> HandshakeStatus;

    /// Whether `peer` may take one of our leaf slots.
    fn leaf_connection_status(&self, peer: &HandshakeResponse) -> HandshakeStatus;

    fn is_ultrapeer_needed(&self) -> bool;

    fn is_leaf_demotion_allowed(&self) -> bool;

    /// Up to `count` candidate hosts for `X-Try-Ultrapeers`, best first.
    /// `ultrapeers` asks for hosts with ultrapeer slots rather than leaf slots.
    fn available_hosts(&self, ultrapeers: bool, locale: &str, count: usize) -> Vec<SocketAddr>;

    fn leaf_nodes(&self) -> Vec<SocketAddr>;

    fn ultrapeer_nodes(&self) -> Vec<SocketAddr>;

    fn listen_addr(&self) -> Option<SocketAddr>;
}

#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub role: Role,
    pub listen_addr: Option<SocketAddr>,
    pub max_leaves: usize,
    pub max_ultrapeers: usize,
    /// Ultrapeers a leaf keeps.
    pub max_ups_as_leaf: usize,
    /// Below this many ultrapeer connections we advertise that one is needed.
    pub min_ultrapeers: usize,
    pub leaf_demotion: bool,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            role: Role::Leaf,
            listen_addr: None,
            max_leaves: 30,
            max_ultrapeers: 32,
            max_ups_as_leaf: 3,
            min_ultrapeers: 4,
            leaf_demotion: true,
        }
    }
}

impl SlotConfig {
    /// - GNUT_ROLE (leaf | ultrapeer, default leaf)
    /// - GNUT_MAX_LEAVES (default 30)
    /// - GNUT_MAX_ULTRAPEERS (default 32)
    /// - GNUT_MAX_UPS_AS_LEAF (default 3)
    /// - GNUT_MIN_ULTRAPEERS (default 4)
    /// - GNUT_LEAF_DEMOTION (bool, default true)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Ok(role) = std::env::var("GNUT_ROLE") {
            cfg.role = role.parse()?;
        }
        cfg.max_leaves = parse_env_usize("GNUT_MAX_LEAVES", cfg.max_leaves);
        cfg.max_ultrapeers = parse_env_usize("GNUT_MAX_ULTRAPEERS", cfg.max_ultrapeers);
        cfg.max_ups_as_leaf = parse_env_usize("GNUT_MAX_UPS_AS_LEAF", cfg.max_ups_as_leaf);
        cfg.min_ultrapeers = parse_env_usize("GNUT_MIN_ULTRAPEERS", cfg.min_ultrapeers);
        cfg.leaf_demotion = parse_env_bool("GNUT_LEAF_DEMOTION", cfg.leaf_demotion);
        Ok(cfg)
    }
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct KnownHost {
    addr: SocketAddr,
    locale: Option<String>,
}

#[derive(Debug, Default)]
struct SlotState {
    demoted: bool,
    leaves: Vec<SocketAddr>,
    ultrapeers: Vec<SocketAddr>,
    known: Vec<KnownHost>,
}

/// In-memory slot accounting and host directory for a single node.
#[derive(Debug)]
pub struct SlotTable {
    cfg: SlotConfig,
    state: RwLock<SlotState>,
}

/// Cap on remembered `X-Try-Ultrapeers` hosts.
const MAX_KNOWN_HOSTS: usize = 200;

impl SlotTable {
    pub fn new(cfg: SlotConfig) -> Self {
        Self { cfg, state: RwLock::new(SlotState::default()) }
    }

    pub fn config(&self) -> &SlotConfig {
        &self.cfg
    }

    /// Takes a slot for an established peer, as a leaf when it said
    /// `X-Ultrapeer: false` and as an ultrapeer otherwise.
    pub fn add_peer(&self, addr: SocketAddr, remote: &HandshakeResponse) {
        let mut st = self.state.write();
        if remote.is_leaf() {
            st.leaves.push(addr);
        } else {
            st.ultrapeers.push(addr);
        }
        debug!(target: "gnutd", %addr, leaves = st.leaves.len(), ultrapeers = st.ultrapeers.len(), "peer registered");
    }

    pub fn remove_peer(&self, addr: SocketAddr) {
        let mut st = self.state.write();
        st.leaves.retain(|a| *a != addr);
        st.ultrapeers.retain(|a| *a != addr);
    }

    /// Remembers hosts a peer told us about, newest first.
    pub fn learn_hosts(&self, hosts: &[SocketAddr], locale: Option<&str>) {
        if hosts.is_empty() {
            return;
        }
        let mut st = self.state.write();
        for addr in hosts.iter().rev() {
            st.known.retain(|h| h.addr != *addr);
            st.known.insert(0, KnownHost { addr: *addr, locale: locale.map(str::to_string) });
        }
        st.known.truncate(MAX_KNOWN_HOSTS);
    }

    /// Switches an ultrapeer to leaf mode after it accepted demotion guidance.
    pub fn demote_to_leaf(&self) {
        let mut st = self.state.write();
        if !st.demoted && self.cfg.role == Role::Ultrapeer {
            st.demoted = true;
            info!(target: "gnutd", "demoted to leaf on peer guidance");
        }
    }

    fn role(&self, st: &SlotState) -> Role {
        if st.demoted {
            Role::Leaf
        } else {
            self.cfg.role
        }
    }
}

impl HandshakeServices for SlotTable {
    fn is_ultrapeer(&self) -> bool {
        self.role(&self.state.read()) == Role::Ultrapeer
    }

    fn connection_status(&self, peer: &HandshakeResponse) -> HandshakeStatus {
        let st = self.state.read();
        match self.role(&st) {
            Role::Leaf => {
                if !peer.is_ultrapeer() {
                    HandshakeStatus::WeAreLeaves
                } else if st.ultrapeers.len() >= self.cfg.max_ups_as_leaf {
                    HandshakeStatus::TooManyUltrapeers
                } else if !peer.is_good_ultrapeer() {
                    HandshakeStatus::NotGoodUltrapeer
                } else {
                    HandshakeStatus::Ok
                }
            }
            Role::Ultrapeer => {
                if peer.is_leaf() {
                    drop(st);
                    return self.leaf_connection_status(peer);
                }
                if !peer.is_ultrapeer() {
                    HandshakeStatus::NoXUltrapeer
                } else if st.ultrapeers.len() >= self.cfg.max_ultrapeers {
                    HandshakeStatus::TooManyUltrapeers
                } else if !peer.is_good_ultrapeer() {
                    HandshakeStatus::NotGoodUltrapeer
                } else {
                    HandshakeStatus::Ok
                }
            }
        }
    }

    fn leaf_connection_status(&self, peer: &HandshakeResponse) -> HandshakeStatus {
        let st = self.state.read();
        if self.role(&st) != Role::Ultrapeer {
            HandshakeStatus::NotAllowedLeaf
        } else if st.leaves.len() >= self.cfg.max_leaves {
            HandshakeStatus::TooManyLeaves
        } else if !peer.is_good_leaf() {
            HandshakeStatus::NotGoodLeaf
        } else {
            HandshakeStatus::Ok
        }
    }

    fn is_ultrapeer_needed(&self) -> bool {
        self.state.read().ultrapeers.len() < self.cfg.min_ultrapeers
    }

    fn is_leaf_demotion_allowed(&self) -> bool {
        let st = self.state.read();
        self.cfg.leaf_demotion && self.role(&st) == Role::Ultrapeer && st.leaves.is_empty()
    }

    fn available_hosts(&self, ultrapeers: bool, locale: &str, count: usize) -> Vec<SocketAddr> {
        let st = self.state.read();
        let mut out: Vec<SocketAddr> = Vec::with_capacity(count);
        // ultrapeer candidates are pointed at ultrapeers we are already talking to
        if ultrapeers {
            out.extend(st.ultrapeers.iter().take(count));
        }
        let matching = st.known.iter().filter(|h| h.locale.as_deref() == Some(locale));
        let rest = st.known.iter().filter(|h| h.locale.as_deref() != Some(locale));
        for host in matching.chain(rest) {
            if out.len() >= count {
                break;
            }
            if !out.contains(&host.addr) {
                out.push(host.addr);
            }
        }
        out
    }

    fn leaf_nodes(&self) -> Vec<SocketAddr> {
        self.state.read().leaves.clone()
    }

    fn ultrapeer_nodes(&self) -> Vec<SocketAddr> {
        self.state.read().ultrapeers.clone()
    }

    fn listen_addr(&self) -> Option<SocketAddr> {
        self.cfg.listen_addr
    }
}
