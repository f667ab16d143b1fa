//! Protocol-level types for the Gnutella 0.6 connection handshake.
//!
//! Nothing here performs I/O: the codec is fed bytes and hands back header
//! blocks, and responses are plain values. The async side lives in `gnutd`.

pub mod codec;
pub mod config;
pub mod error;
pub mod headers;
pub mod limits;
pub mod response;
pub mod status;

pub use codec::{BlockDecoder, HeaderBlock};
pub use config::HandshakeConfig;
pub use error::{HandshakeError, HandshakeFailure, Origin, Rejection, RejectionKind};
pub use headers::HeaderSet;
pub use response::HandshakeResponse;
pub use status::HandshakeStatus;
