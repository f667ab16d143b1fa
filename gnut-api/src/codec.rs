//! Header block framing for the Gnutella 0.6 handshake.
//!
//! A block is an opening line, zero or more `Key: Value` lines, and a bare
//! CRLF. [`BlockDecoder`] is fed raw bytes as they arrive and yields whole
//! blocks; bytes already scanned are never looked at again, and bytes past the
//! end of a block stay buffered for the next one.

use memchr::memchr;
use tracing::debug;

use crate::{
    error::{HandshakeError, HandshakeResult},
    headers::{self, HeaderSet},
    limits::HeaderLimits,
};

pub const CRLF: &str = "\r\n";
pub const GNUTELLA_CONNECT_PREFIX: &str = "GNUTELLA CONNECT/";
pub const GNUTELLA_CONNECT_06: &str = "GNUTELLA CONNECT/0.6";
pub const GNUTELLA_06: &str = "GNUTELLA/0.6";

/// One opening line and the headers read after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub start_line: String,
    pub headers: HeaderSet,
}

#[derive(Debug)]
pub struct BlockDecoder {
    limits: HeaderLimits,
    buf: Vec<u8>,
    /// Start of the line currently being assembled.
    line_start: usize,
    /// Everything before this offset has been searched for a newline.
    scanned: usize,
    start_line: Option<String>,
    headers: HeaderSet,
    header_lines: usize,
}

impl BlockDecoder {
    pub fn new(limits: HeaderLimits) -> Self {
        Self {
            limits,
            buf: Vec::with_capacity(1024),
            line_start: 0,
            scanned: 0,
            start_line: None,
            headers: HeaderSet::new(),
            header_lines: 0,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet part of any block.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.line_start..]
    }

    /// Hands back unconsumed bytes, e.g. the first messages sent after the handshake.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        let rest = self.buf.split_off(self.line_start);
        self.buf.clear();
        self.line_start = 0;
        self.scanned = 0;
        rest
    }

    /// Returns the next complete block, or `None` until more bytes arrive.
    pub fn next_block(&mut self) -> HandshakeResult<Option<HeaderBlock>> {
        loop {
            let Some(rel) = memchr(b'\n', &self.buf[self.scanned..]) else {
                self.scanned = self.buf.len();
                let mut pending = self.buf.len() - self.line_start;
                if self.buf.last() == Some(&b'\r') {
                    pending = pending.saturating_sub(1);
                }
                self.limits.enforce_line_len(pending)?;
                return Ok(None);
            };
            let newline = self.scanned + rel;
            let mut end = newline;
            if end > self.line_start && self.buf[end - 1] == b'\r' {
                end -= 1;
            }
            self.limits.enforce_line_len(end - self.line_start)?;
            let line = String::from_utf8_lossy(&self.buf[self.line_start..end]).into_owned();
            self.line_start = newline + 1;
            self.scanned = self.line_start;

            if self.start_line.is_none() {
                self.start_line = Some(line);
                continue;
            }
            if line.is_empty() {
                let block = HeaderBlock {
                    start_line: self.start_line.take().unwrap_or_default(),
                    headers: std::mem::take(&mut self.headers),
                };
                self.header_lines = 0;
                self.compact();
                return Ok(Some(block));
            }
            self.header_lines += 1;
            self.limits.enforce_header_count(self.header_lines)?;
            match parse_header_line(&line) {
                Some((name, value)) => self.headers.insert(name, value),
                None => debug!(target: "gnut_api", "skipping header line without ':': {line:?}"),
            }
        }
    }

    fn compact(&mut self) {
        self.buf.drain(..self.line_start);
        self.scanned -= self.line_start;
        self.line_start = 0;
    }
}

/// Splits `Key: Value` at the first colon, trimming both halves.
pub fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let idx = memchr(b':', line.as_bytes())?;
    let (name, value) = line.split_at(idx);
    Some((name.trim(), value[1..].trim()))
}

/// Serialized block plus the headers exactly as they went on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlock {
    pub bytes: Vec<u8>,
    pub written: HeaderSet,
}

/// Writes `start_line`, each header in order, then the terminator. Any
/// `Remote-IP` entry is replaced by `remote_ip` whatever its supplied value.
pub fn encode_block(start_line: &str, headers: &HeaderSet, remote_ip: &str) -> EncodedBlock {
    let mut out = Vec::with_capacity(256);
    let mut written = HeaderSet::new();
    out.extend_from_slice(start_line.as_bytes());
    out.extend_from_slice(CRLF.as_bytes());
    for (name, value) in headers.iter() {
        let value = if name == headers::REMOTE_IP { remote_ip } else { value };
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(CRLF.as_bytes());
        written.insert(name, value);
    }
    out.extend_from_slice(CRLF.as_bytes());
    EncodedBlock { bytes: out, written }
}

/// `GNUTELLA CONNECT/<major>.<minor>` with a version of at least 0.6.
pub fn is_connect_line_valid(line: &str) -> bool {
    let Some(version) = line.strip_prefix(GNUTELLA_CONNECT_PREFIX) else {
        return false;
    };
    let Some((major, minor)) = version.trim().split_once('.') else {
        return false;
    };
    match (major.parse::<u32>(), minor.parse::<u32>()) {
        (Ok(major), Ok(minor)) => (major, minor) >= (0, 6),
        _ => false,
    }
}

/// Strips the `GNUTELLA/0.6` marker, leaving `"<code> <message>"`.
pub fn strip_response_prefix(line: &str) -> HandshakeResult<&str> {
    line.strip_prefix(GNUTELLA_06)
        .map(str::trim)
        .ok_or_else(|| HandshakeError::BadStatusLine(line.to_string()))
}

/// `GNUTELLA/0.6 <code> <message>`.
pub fn response_line(status_line: &str) -> String {
    format!("{GNUTELLA_06} {status_line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::LimitError;

    #[test]
    fn decodes_block_split_across_reads() {
        let mut d = BlockDecoder::new(HeaderLimits::default());
        d.extend(b"GNUTELLA CONNECT/0.6\r\nX-Ultra");
        assert!(d.next_block().unwrap().is_none());
        d.extend(b"peer: True\r\n");
        assert!(d.next_block().unwrap().is_none());
        d.extend(b"\r\nGNUTELLA/0.6 200 OK\r\n");
        let block = d.next_block().unwrap().expect("block");
        assert_eq!(block.start_line, GNUTELLA_CONNECT_06);
        assert_eq!(block.headers.get(headers::X_ULTRAPEER), Some("True"));
        assert_eq!(d.buffered(), b"GNUTELLA/0.6 200 OK\r\n");
    }

    #[test]
    fn partial_line_over_limit_fails_early() {
        let limits = HeaderLimits { max_headers: 30, max_line_len: 16 };
        let mut d = BlockDecoder::new(limits);
        d.extend(b"GNUTELLA CONNECT/0.6 and then some");
        let err = d.next_block().expect_err("line too long");
        assert!(matches!(err, HandshakeError::Limit(LimitError::LineTooLong { max: 16, .. })));
    }

    #[test]
    fn connect_line_versions() {
        assert!(is_connect_line_valid("GNUTELLA CONNECT/0.6"));
        assert!(is_connect_line_valid("GNUTELLA CONNECT/0.7"));
        assert!(is_connect_line_valid("GNUTELLA CONNECT/1.0"));
        assert!(!is_connect_line_valid("GNUTELLA CONNECT/0.4"));
        assert!(!is_connect_line_valid("GNUTELLA/0.6 200 OK"));
        assert!(!is_connect_line_valid("FOOBAR"));
    }

    #[test]
    fn response_prefix() {
        assert_eq!(strip_response_prefix("GNUTELLA/0.6 200 OK").unwrap(), "200 OK");
        assert!(strip_response_prefix("HTTP/1.1 200 OK").is_err());
        assert_eq!(response_line("503 No Leaf Slots"), "GNUTELLA/0.6 503 No Leaf Slots");
    }
}
