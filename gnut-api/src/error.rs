use std::{fmt, time::Duration};

use thiserror::Error;

use crate::{
    limits::LimitError,
    status::{LOCALE_NO_MATCH, SLOTS_FULL},
};

/// Faults that end a handshake attempt: malformed protocol text, broken
/// limits, and transport failures. Never retried in place.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("bad connect line: {0:?}")]
    BadConnectLine(String),
    #[error("bad status line: {0:?}")]
    BadStatusLine(String),
    #[error(transparent)]
    Limit(#[from] LimitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake step timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed during handshake")]
    Closed,
    #[error("handshake shut down")]
    Shutdown,
}

pub type HandshakeResult<T> = Result<T, HandshakeError>;

/// Which side produced the non-200 status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// We wrote the rejection.
    Local,
    /// The peer wrote the rejection.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    SlotsFull,
    LocaleMismatch,
    /// A code this side does not classify, e.g. from an unfamiliar client.
    Unknown,
}

/// A legitimate non-200 status sent by either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub origin: Origin,
    pub kind: RejectionKind,
    pub code: u16,
    pub message: String,
}

impl Rejection {
    /// Classifies a status the peer sent us.
    pub fn remote(code: u16, message: impl Into<String>) -> Self {
        let kind = match code {
            SLOTS_FULL => RejectionKind::SlotsFull,
            LOCALE_NO_MATCH => RejectionKind::LocaleMismatch,
            _ => RejectionKind::Unknown,
        };
        Self { origin: Origin::Remote, kind, code, message: message.into() }
    }

    pub fn local(kind: RejectionKind, code: u16, message: impl Into<String>) -> Self {
        Self { origin: Origin::Local, kind, code, message: message.into() }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.origin {
            Origin::Local => "rejected locally",
            Origin::Remote => "rejected by peer",
        };
        write!(f, "{who} ({:?}): {} {}", self.kind, self.code, self.message)
    }
}

/// Every way a handshake can end without producing a usable connection.
#[derive(Debug, Error)]
pub enum HandshakeFailure {
    #[error(transparent)]
    Error(#[from] HandshakeError),
    #[error("{0}")]
    Rejected(Rejection),
    /// The peer is a crawler; it got its topology answer and is dropped.
    #[error("crawler connection closed after topology response")]
    Crawler,
}

impl From<Rejection> for HandshakeFailure {
    fn from(r: Rejection) -> Self {
        HandshakeFailure::Rejected(r)
    }
}

impl From<LimitError> for HandshakeFailure {
    fn from(e: LimitError) -> Self {
        HandshakeFailure::Error(HandshakeError::Limit(e))
    }
}

impl From<std::io::Error> for HandshakeFailure {
    fn from(e: std::io::Error) -> Self {
        HandshakeFailure::Error(HandshakeError::Io(e))
    }
}
