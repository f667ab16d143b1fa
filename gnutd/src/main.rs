use gnutd::{
    proto::handshake::{CompletedHandshake, Direction, HandshakeMachine, HandshakeObserver},
    responder::{make_responder, HandshakeResponder},
    services::{HandshakeServices, SlotConfig, SlotTable},
};

use anyhow::{Context, Result};
use dotenv::dotenv;
use gnut_api::{HandshakeConfig, HandshakeFailure};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // GNUT_ADDR (default 0.0.0.0:6346), GNUT_CONNECT (comma-separated peers to dial)
    let addr = std::env::var("GNUT_ADDR").unwrap_or_else(|_| "0.0.0.0:6346".to_string());
    let listen: SocketAddr = addr.parse().with_context(|| format!("invalid GNUT_ADDR: {addr}"))?;

    let config = Arc::new(HandshakeConfig::from_env());
    let mut slot_cfg = SlotConfig::from_env().context("invalid slot configuration")?;
    slot_cfg.listen_addr = Some(listen);
    let role = slot_cfg.role;
    let slots = Arc::new(SlotTable::new(slot_cfg));
    let responder = make_responder(role, config.clone(), slots.clone());

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!(target: "gnutd", %listen, %role, user_agent = %config.user_agent, "gnutd listening");

    for peer in dial_targets() {
        let node = Node { config: config.clone(), responder: responder.clone(), slots: slots.clone() };
        tokio::spawn(async move {
            if let Err(err) = node.dial(peer).await {
                warn!(target: "gnutd", %peer, "dial failed: {err:#}");
            }
        });
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        let node = Node { config: config.clone(), responder: responder.clone(), slots: slots.clone() };
        tokio::spawn(async move {
            node.serve(stream, peer, Direction::Incoming).await;
        });
    }
}

fn dial_targets() -> Vec<SocketAddr> {
    let Ok(raw) = std::env::var("GNUT_CONNECT") else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                warn!(target: "gnutd", entry = s, "ignoring bad GNUT_CONNECT entry");
                None
            }
        })
        .collect()
}

struct Node {
    config: Arc<HandshakeConfig>,
    responder: Arc<dyn HandshakeResponder>,
    slots: Arc<SlotTable>,
}

impl Node {
    async fn dial(self, peer: SocketAddr) -> Result<()> {
        let stream = tokio::time::timeout(self.config.read_timeout, TcpStream::connect(peer))
            .await
            .with_context(|| format!("connect to {peer} timed out"))?
            .with_context(|| format!("connect to {peer}"))?;
        self.serve(stream, peer, Direction::Outgoing).await;
        Ok(())
    }

    async fn serve(self, mut stream: TcpStream, peer: SocketAddr, direction: Direction) {
        let machine = match direction {
            Direction::Incoming => {
                HandshakeMachine::incoming(peer, self.responder.clone(), self.config.clone())
            }
            Direction::Outgoing => {
                HandshakeMachine::outgoing(peer, self.responder.clone(), self.config.clone())
            }
        };
        let mut registry = PeerRegistry { slots: self.slots.clone() };
        if machine.run_with_observer(&mut stream, &mut registry).await.is_err() {
            return;
        }

        // message exchange is not handled here; hold the slot until the peer leaves
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        self.slots.remove_peer(peer);
        info!(target: "gnutd", %peer, "peer disconnected");
    }
}

/// Promotes finished handshakes into slot-table entries.
struct PeerRegistry {
    slots: Arc<SlotTable>,
}

impl HandshakeObserver for PeerRegistry {
    fn handle_states_finished(&mut self, completed: &CompletedHandshake) {
        let remote = completed.remote_response();
        self.slots.learn_hosts(&remote.try_ultrapeer_hosts(), remote.locale_pref());
        if completed.direction == Direction::Outgoing
            && self.slots.is_ultrapeer()
            && completed.local_response().is_leaf()
        {
            self.slots.demote_to_leaf();
        }
        self.slots.add_peer(completed.remote, &remote);
        info!(
            target: "gnutd",
            peer = %completed.remote,
            direction = ?completed.direction,
            user_agent = remote.user_agent().unwrap_or("-"),
            ultrapeer = remote.is_ultrapeer(),
            "handshake complete"
        );
    }

    fn handle_failure(&mut self, remote: SocketAddr, failure: &HandshakeFailure) {
        debug!(target: "gnutd", %remote, "connection dropped: {failure}");
    }
}
