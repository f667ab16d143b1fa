//! The Gnutella 0.6 connection handshake as a fixed list of read and write
//! steps.
//!
//! Each step is a plain function over [`HandshakeContext`]: read steps take a
//! decoded header block, write steps produce the bytes to send. The async
//! driver in [`HandshakeMachine::run`] only moves bytes between those functions
//! and the socket, one step at a time and in list order.

use std::{net::SocketAddr, sync::Arc};

use gnut_api::{
    codec::{
        encode_block, is_connect_line_valid, response_line, strip_response_prefix, BlockDecoder,
        EncodedBlock, HeaderBlock, GNUTELLA_CONNECT_06,
    },
    error::{HandshakeError, HandshakeFailure, Rejection, RejectionKind},
    status::{CRAWLER_CODE, LOCALE_NO_MATCH, OK, SLOTS_FULL},
    HandshakeConfig, HandshakeResponse, HeaderSet,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    proto::http_like::{read_block, write_block},
    responder::HandshakeResponder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The peer dialed us.
    Incoming,
    /// We dialed the peer.
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Read `GNUTELLA CONNECT/0.6` and the peer's headers.
    ReadRequest,
    /// Write `GNUTELLA CONNECT/0.6` and our headers.
    WriteRequest,
    /// Read `GNUTELLA/0.6 <code> <message>` and headers.
    ReadResponse,
    /// Ask the responder what to say, then write it.
    WriteResponse { outgoing: bool },
}

pub const INCOMING_STATES: &[HandshakeState] = &[
    HandshakeState::ReadRequest,
    HandshakeState::WriteResponse { outgoing: false },
    HandshakeState::ReadResponse,
];

pub const OUTGOING_STATES: &[HandshakeState] = &[
    HandshakeState::WriteRequest,
    HandshakeState::ReadResponse,
    HandshakeState::WriteResponse { outgoing: true },
];

impl Direction {
    pub fn states(self) -> &'static [HandshakeState] {
        match self {
            Direction::Incoming => INCOMING_STATES,
            Direction::Outgoing => OUTGOING_STATES,
        }
    }
}

/// What one handshake has seen and said so far.
#[derive(Debug, Clone)]
pub struct HandshakeContext {
    remote: SocketAddr,
    headers_read: HeaderSet,
    headers_written: HeaderSet,
    last_read: Option<HandshakeResponse>,
    last_written: Option<HandshakeResponse>,
}

impl HandshakeContext {
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            remote,
            headers_read: HeaderSet::new(),
            headers_written: HeaderSet::new(),
            last_read: None,
            last_written: None,
        }
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Every header the peer has sent, later blocks overriding earlier ones.
    pub fn headers_read(&self) -> &HeaderSet {
        &self.headers_read
    }

    /// Every header we have sent, with `Remote-IP` as it went out.
    pub fn headers_written(&self) -> &HeaderSet {
        &self.headers_written
    }

    /// The peer's most recent block, or the shared empty response before any.
    pub fn last_read(&self) -> &HandshakeResponse {
        self.last_read.as_ref().unwrap_or_else(|| HandshakeResponse::empty())
    }

    pub fn last_written(&self) -> Option<&HandshakeResponse> {
        self.last_written.as_ref()
    }

    fn remote_ip(&self) -> String {
        self.remote.ip().to_string()
    }
}

/// ReadRequest: the opening line must be a connect line for 0.6 or later.
pub fn on_request(ctx: &mut HandshakeContext, block: HeaderBlock) -> Result<(), HandshakeFailure> {
    if !is_connect_line_valid(&block.start_line) {
        return Err(HandshakeError::BadConnectLine(block.start_line).into());
    }
    ctx.headers_read.merge(&block.headers);
    ctx.last_read = Some(HandshakeResponse::new(block.headers));
    Ok(())
}

/// Checked before ReadResponse waits on the socket: a crawler has had its
/// answer and gets nothing more.
pub fn check_crawler(ctx: &HandshakeContext) -> Result<(), HandshakeFailure> {
    if ctx.last_read().is_crawler() {
        return Err(HandshakeFailure::Crawler);
    }
    Ok(())
}

/// ReadResponse: parses the status line. Anything but 200 ends the handshake
/// as a rejection by the peer.
pub fn on_response(ctx: &mut HandshakeContext, block: HeaderBlock) -> Result<(), HandshakeFailure> {
    let status_line = strip_response_prefix(&block.start_line)?;
    let response = HandshakeResponse::from_status_line(status_line, block.headers)?;
    ctx.headers_read.merge(response.headers());
    if response.is_crawler() {
        return Err(HandshakeFailure::Crawler);
    }
    if !response.is_accepted() {
        let rejection = Rejection::remote(response.status_code(), response.status_message());
        ctx.last_read = Some(response);
        return Err(rejection.into());
    }
    ctx.last_read = Some(response);
    Ok(())
}

/// WriteRequest: our connect line and request headers.
pub fn prepare_request(ctx: &HandshakeContext, responder: &dyn HandshakeResponder) -> EncodedBlock {
    encode_block(GNUTELLA_CONNECT_06, &responder.request_headers(), &ctx.remote_ip())
}

/// WriteResponse, before the write: what the responder says to the last block read.
pub fn prepare_response(
    ctx: &HandshakeContext,
    responder: &dyn HandshakeResponder,
    outgoing: bool,
) -> (HandshakeResponse, EncodedBlock) {
    let response = responder.respond(ctx.last_read(), outgoing);
    let encoded = encode_block(
        &response_line(&response.status_line()),
        response.headers(),
        &ctx.remote_ip(),
    );
    (response, encoded)
}

/// Records a block once it is on the wire.
pub fn on_written(ctx: &mut HandshakeContext, written: &HeaderSet) {
    ctx.headers_written.merge(written);
}

/// WriteResponse, after the write: a non-200 we sent ends the handshake. The
/// crawler answer on an incoming connection is let through; the following
/// ReadResponse closes it.
pub fn check_response_written(
    ctx: &mut HandshakeContext,
    response: HandshakeResponse,
    outgoing: bool,
) -> Result<(), HandshakeFailure> {
    let code = response.status_code();
    let message = response.status_message().to_string();
    ctx.last_written = Some(response);
    if code == OK || (!outgoing && code == CRAWLER_CODE) {
        return Ok(());
    }
    // refusal kinds only apply to connections we dialed
    let kind = match code {
        SLOTS_FULL if outgoing => RejectionKind::SlotsFull,
        LOCALE_NO_MATCH if outgoing => RejectionKind::LocaleMismatch,
        _ => RejectionKind::Unknown,
    };
    Err(Rejection::local(kind, code, message).into())
}

/// Everything exchanged by a handshake that ran to completion.
#[derive(Debug, Clone)]
pub struct CompletedHandshake {
    pub remote: SocketAddr,
    pub direction: Direction,
    pub headers_read: HeaderSet,
    pub headers_written: HeaderSet,
    /// Bytes the peer sent after its last header block.
    pub remaining: Vec<u8>,
}

impl CompletedHandshake {
    /// A response view over everything the peer sent.
    pub fn remote_response(&self) -> HandshakeResponse {
        HandshakeResponse::new(self.headers_read.clone())
    }

    /// A response view over everything we sent.
    pub fn local_response(&self) -> HandshakeResponse {
        HandshakeResponse::new(self.headers_written.clone())
    }
}

/// Hooks for whoever owns the connection. Exactly one is called per run.
pub trait HandshakeObserver {
    fn handle_states_finished(&mut self, completed: &CompletedHandshake);

    fn handle_failure(&mut self, remote: SocketAddr, failure: &HandshakeFailure);
}

/// Drives one connection's handshake.
pub struct HandshakeMachine {
    direction: Direction,
    ctx: HandshakeContext,
    responder: Arc<dyn HandshakeResponder>,
    config: Arc<HandshakeConfig>,
    shutdown: CancellationToken,
}

impl HandshakeMachine {
    pub fn incoming(
        remote: SocketAddr,
        responder: Arc<dyn HandshakeResponder>,
        config: Arc<HandshakeConfig>,
    ) -> Self {
        Self::new(Direction::Incoming, remote, responder, config)
    }

    pub fn outgoing(
        remote: SocketAddr,
        responder: Arc<dyn HandshakeResponder>,
        config: Arc<HandshakeConfig>,
    ) -> Self {
        Self::new(Direction::Outgoing, remote, responder, config)
    }

    fn new(
        direction: Direction,
        remote: SocketAddr,
        responder: Arc<dyn HandshakeResponder>,
        config: Arc<HandshakeConfig>,
    ) -> Self {
        Self {
            direction,
            ctx: HandshakeContext::new(remote),
            responder,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Cancelling this token abandons the handshake at its next suspension point.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs every step in order. On failure the stream is shut down before returning.
    pub async fn run<S>(self, stream: &mut S) -> Result<CompletedHandshake, HandshakeFailure>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let remote = self.ctx.remote;
        let token = self.shutdown.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(HandshakeFailure::Error(HandshakeError::Shutdown)),
            r = self.drive(&mut *stream) => r,
        };
        if let Err(failure) = &result {
            match failure {
                HandshakeFailure::Rejected(r) => debug!(target: "gnutd", %remote, "{r}"),
                HandshakeFailure::Crawler => debug!(target: "gnutd", %remote, "crawler served"),
                HandshakeFailure::Error(e) => warn!(target: "gnutd", %remote, "handshake failed: {e}"),
            }
            if let Err(e) = stream.shutdown().await {
                debug!(target: "gnutd", %remote, "stream shutdown failed: {e}");
            }
        }
        result
    }

    /// [`run`](Self::run), reporting the outcome to `observer`.
    pub async fn run_with_observer<S, O>(
        self,
        stream: &mut S,
        observer: &mut O,
    ) -> Result<CompletedHandshake, HandshakeFailure>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        O: HandshakeObserver + ?Sized,
    {
        let remote = self.ctx.remote;
        let result = self.run(stream).await;
        match &result {
            Ok(done) => observer.handle_states_finished(done),
            Err(failure) => observer.handle_failure(remote, failure),
        }
        result
    }

    async fn drive<S>(mut self, stream: &mut S) -> Result<CompletedHandshake, HandshakeFailure>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let timeout = self.config.read_timeout;
        let mut decoder = BlockDecoder::new(self.config.limits);
        let responder = self.responder.as_ref();

        for (step, state) in self.direction.states().iter().copied().enumerate() {
            debug!(target: "gnutd", remote = %self.ctx.remote, step, ?state, "handshake step");
            match state {
                HandshakeState::ReadRequest => {
                    let block = read_block(stream, &mut decoder, timeout).await?;
                    on_request(&mut self.ctx, block)?;
                }
                HandshakeState::ReadResponse => {
                    check_crawler(&self.ctx)?;
                    let block = read_block(stream, &mut decoder, timeout).await?;
                    on_response(&mut self.ctx, block)?;
                }
                HandshakeState::WriteRequest => {
                    let encoded = prepare_request(&self.ctx, responder);
                    write_block(stream, &encoded.bytes, timeout).await?;
                    on_written(&mut self.ctx, &encoded.written);
                }
                HandshakeState::WriteResponse { outgoing } => {
                    let (response, encoded) = prepare_response(&self.ctx, responder, outgoing);
                    write_block(stream, &encoded.bytes, timeout).await?;
                    on_written(&mut self.ctx, &encoded.written);
                    check_response_written(&mut self.ctx, response, outgoing)?;
                }
            }
        }

        Ok(CompletedHandshake {
            remote: self.ctx.remote,
            direction: self.direction,
            headers_read: self.ctx.headers_read,
            headers_written: self.ctx.headers_written,
            remaining: decoder.take_remaining(),
        })
    }
}
