use std::{fmt, net::SocketAddr};

use once_cell::sync::Lazy;

use crate::{
    error::{HandshakeError, HandshakeResult},
    headers::{self, HeaderSet},
    status::{
        HandshakeStatus, CRAWLER_CODE, CRAWLER_MESSAGE, LOCALE_NO_MATCH, LOCALE_NO_MATCH_MESSAGE,
        OK, OK_MESSAGE, SLOTS_FULL,
    },
};

/// Number of hosts returned in an `X-Try-Ultrapeers` header.
pub const NUM_X_TRY_ULTRAPEER_HOSTS: usize = 10;

const DEFAULT_DEGREE: i32 = 6;
const DEFAULT_MAX_TTL: i8 = 4;
const HIGH_DEGREE: i32 = 15;
const MIN_FEATURE_VERSION: f32 = 0.1;

/// LimeWire releases below this are considered old.
pub const OLD_LIME_VERSION: LimeVersion = LimeVersion { major: 3, minor: 4, patch: 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LimeVersion {
    /// Reads the version out of a `LimeWire/4.18.8` style user agent.
    pub fn from_user_agent(user_agent: &str) -> Option<Self> {
        let mut tokens = user_agent
            .split(|c: char| c == '/' || c == '.' || c == ' ')
            .filter(|t| !t.is_empty());
        tokens.next()?;
        let major = tokens.next()?;
        let minor = tokens.next()?;
        let patch = tokens.next().unwrap_or("0");
        Some(Self {
            major: leading_number(major)?,
            minor: leading_number(minor)?,
            patch: leading_number(patch)?,
        })
    }
}

impl fmt::Display for LimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(token: &str) -> Option<u32> {
    let end = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
    token[..end].parse().ok()
}

/// Values derived from the headers once, at construction.
#[derive(Debug, Clone, PartialEq)]
struct Capabilities {
    degree: i32,
    high_degree: bool,
    ultrapeer_qrp: bool,
    max_ttl: i8,
    dynamic_query: bool,
    probe_queries: bool,
    no_requerying: bool,
    lime_wire: bool,
    lime_version: Option<LimeVersion>,
    old_lime_wire: bool,
    good_ultrapeer: bool,
    good_leaf: bool,
    ultrapeer: bool,
    leaf: bool,
    leaf_guidance: bool,
    deflate_encoded: bool,
    accepts_deflate: bool,
    pong_caching: bool,
    guess_capable: bool,
    query_routing: bool,
    crawler: bool,
    ggep: bool,
    temp_connection: bool,
    vendor_messages: f32,
    listen_port: Option<u16>,
}

impl Capabilities {
    fn derive(h: &HeaderSet) -> Self {
        let degree = int_value(h, headers::X_DEGREE).unwrap_or(DEFAULT_DEGREE);
        let high_degree = degree >= HIGH_DEGREE;
        let ultrapeer_qrp = is_version_or_higher(h, headers::X_ULTRAPEER_QUERY_ROUTING);
        let max_ttl = h
            .get(headers::X_MAX_TTL)
            .and_then(|v| v.parse::<i8>().ok())
            .unwrap_or(DEFAULT_MAX_TTL);
        let dynamic_query = is_version_or_higher(h, headers::X_DYNAMIC_QUERY);
        let no_requerying = is_false_value(h, headers::X_REQUERIES);

        let user_agent = h.get(headers::USER_AGENT).unwrap_or("");
        let lime_wire = user_agent.to_ascii_lowercase().starts_with("limewire");
        let lime_version = if lime_wire { LimeVersion::from_user_agent(user_agent) } else { None };
        let old_lime_wire = lime_version.is_some_and(|v| v < OLD_LIME_VERSION);

        let good_ultrapeer = high_degree && ultrapeer_qrp && max_ttl < 5 && dynamic_query;
        let good_leaf = good_ultrapeer && (lime_wire || no_requerying);

        Self {
            degree,
            high_degree,
            ultrapeer_qrp,
            max_ttl,
            dynamic_query,
            probe_queries: is_version_or_higher(h, headers::X_PROBE_QUERIES),
            no_requerying,
            lime_wire,
            lime_version,
            old_lime_wire,
            good_ultrapeer,
            good_leaf,
            ultrapeer: is_true_value(h, headers::X_ULTRAPEER),
            leaf: is_false_value(h, headers::X_ULTRAPEER),
            leaf_guidance: is_false_value(h, headers::X_ULTRAPEER_NEEDED),
            deflate_encoded: is_string_value(h, headers::CONTENT_ENCODING, headers::DEFLATE_VALUE),
            accepts_deflate: contains_string_value(
                h,
                headers::ACCEPT_ENCODING,
                headers::DEFLATE_VALUE,
            ),
            pong_caching: is_version_or_higher(h, headers::X_PONG_CACHING),
            guess_capable: is_version_or_higher(h, headers::X_GUESS),
            query_routing: is_version_or_higher(h, headers::X_QUERY_ROUTING),
            crawler: is_version_or_higher(h, headers::CRAWLER),
            ggep: h.contains(headers::GGEP),
            temp_connection: is_true_value(h, headers::X_TEMP_CONNECTION),
            vendor_messages: float_value(h, headers::X_VENDOR_MESSAGE).unwrap_or(0.0),
            listen_port: int_value_after(h, headers::LISTEN_IP, ':')
                .and_then(|p| u16::try_from(p).ok()),
        }
    }
}

/// A status line plus headers, sent or received during one handshake step.
///
/// Read-only once built; every policy flag is computed up front from the
/// headers, so accessors never re-parse.
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    status_code: u16,
    status_message: String,
    headers: HeaderSet,
    caps: Capabilities,
}

static EMPTY_RESPONSE: Lazy<HandshakeResponse> = Lazy::new(|| HandshakeResponse::new(HeaderSet::new()));

impl HandshakeResponse {
    /// A `200 OK` response carrying `headers`.
    pub fn new(headers: HeaderSet) -> Self {
        Self::with_status(OK, OK_MESSAGE, headers)
    }

    pub fn with_status(code: u16, message: impl Into<String>, headers: HeaderSet) -> Self {
        let caps = Capabilities::derive(&headers);
        Self { status_code: code, status_message: message.into(), headers, caps }
    }

    /// Shared `200 OK` response with no headers, used before anything is read.
    pub fn empty() -> &'static HandshakeResponse {
        &EMPTY_RESPONSE
    }

    /// Builds the peer's response from its status line (`"<code> <message>"`,
    /// protocol prefix already stripped) and the headers that followed.
    pub fn from_status_line(line: &str, headers: HeaderSet) -> HandshakeResult<Self> {
        let code = extract_code(line).ok_or_else(|| HandshakeError::BadStatusLine(line.to_string()))?;
        let message =
            extract_message(line).ok_or_else(|| HandshakeError::BadStatusLine(line.to_string()))?;
        Ok(Self::with_status(code, message, headers))
    }

    /// Accepts an incoming connection, advertising other hosts alongside our headers.
    pub fn accept_incoming(mut headers: HeaderSet, try_hosts: &[SocketAddr]) -> Self {
        headers.insert(headers::X_TRY_ULTRAPEERS, endpoint_string(try_hosts));
        Self::new(headers)
    }

    /// Final step of an outgoing handshake. Everything else was sent with the request.
    pub fn accept_outgoing(headers: HeaderSet) -> Self {
        Self::new(headers)
    }

    /// Topology answer for a crawler: our role, then every leaf and ultrapeer we hold.
    pub fn crawler(
        user_agent: &str,
        is_ultrapeer: bool,
        leaves: &[SocketAddr],
        ultrapeers: &[SocketAddr],
    ) -> Self {
        let mut h = HeaderSet::new();
        h.insert(headers::USER_AGENT, user_agent);
        h.insert(headers::X_ULTRAPEER, is_ultrapeer.to_string());
        h.insert(headers::LEAVES, endpoint_string_limited(leaves, leaves.len()));
        h.insert(headers::PEERS, endpoint_string_limited(ultrapeers, ultrapeers.len()));
        Self::with_status(CRAWLER_CODE, CRAWLER_MESSAGE, h)
    }

    /// Rejects an incoming connection, pointing the peer at other hosts.
    pub fn reject_incoming(status: HandshakeStatus, try_hosts: &[SocketAddr]) -> Self {
        let mut h = HeaderSet::new();
        h.insert(headers::X_TRY_ULTRAPEERS, endpoint_string(try_hosts));
        Self::with_status(SLOTS_FULL, status.message(), h)
    }

    /// Rejects a connection we dialed. Host lists are never volunteered here.
    pub fn reject_outgoing(status: HandshakeStatus) -> Self {
        Self::with_status(SLOTS_FULL, status.message(), HeaderSet::new())
    }

    pub fn reject_locale() -> Self {
        Self::with_status(LOCALE_NO_MATCH, LOCALE_NO_MATCH_MESSAGE, HeaderSet::new())
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn is_accepted(&self) -> bool {
        self.status_code == OK
    }

    /// `"<code> <message>"`, e.g. `"503 Service Not Available"`.
    pub fn status_line(&self) -> String {
        format!("{} {}", self.status_code, self.status_message)
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(headers::USER_AGENT)
    }

    pub fn version(&self) -> Option<&str> {
        self.headers.get(headers::X_VERSION)
    }

    /// Highest TTL to use for queries sent along this connection.
    pub fn max_ttl(&self) -> i8 {
        self.caps.max_ttl
    }

    /// The `X-Try-Ultrapeers` value, or `""` when absent.
    pub fn x_try_ultrapeers(&self) -> &str {
        self.headers.get(headers::X_TRY_ULTRAPEERS).unwrap_or("")
    }

    /// True when the header was sent at all, even if empty.
    pub fn has_x_try_ultrapeers(&self) -> bool {
        self.headers.contains(headers::X_TRY_ULTRAPEERS)
    }

    /// Hosts listed in `X-Try-Ultrapeers`, skipping entries that do not parse.
    pub fn try_ultrapeer_hosts(&self) -> Vec<SocketAddr> {
        parse_endpoints(self.x_try_ultrapeers())
    }

    /// True when the peer wrote `X-Ultrapeer-Needed: false`.
    pub fn has_leaf_guidance(&self) -> bool {
        self.caps.leaf_guidance
    }

    pub fn num_intra_ultrapeer_connections(&self) -> i32 {
        self.caps.degree
    }

    pub fn is_high_degree_connection(&self) -> bool {
        self.caps.high_degree
    }

    pub fn is_lime_wire(&self) -> bool {
        self.caps.lime_wire
    }

    pub fn is_old_lime_wire(&self) -> bool {
        self.caps.old_lime_wire
    }

    pub fn lime_version(&self) -> Option<LimeVersion> {
        self.caps.lime_version
    }

    pub fn is_good_leaf(&self) -> bool {
        self.caps.good_leaf
    }

    pub fn is_good_ultrapeer(&self) -> bool {
        self.caps.good_ultrapeer
    }

    /// Whether the peer encodes its stream with deflate. The local setting is
    /// not consulted: the peer was already told we can decode it.
    pub fn is_deflate_enabled(&self) -> bool {
        self.caps.deflate_encoded
    }

    /// Whether we should deflate what we send. `encode_deflate` is the local
    /// encoding switch, not the decoding one.
    pub fn is_deflate_accepted(&self, encode_deflate: bool) -> bool {
        encode_deflate && self.caps.accepts_deflate
    }

    pub fn is_ultrapeer_query_routing_connection(&self) -> bool {
        self.caps.ultrapeer_qrp
    }

    /// True iff the peer wrote `X-Ultrapeer: false`. Not the negation of
    /// [`is_ultrapeer`](Self::is_ultrapeer): both are false when the header is absent.
    pub fn is_leaf(&self) -> bool {
        self.caps.leaf
    }

    /// True iff the peer wrote `X-Ultrapeer: true`.
    pub fn is_ultrapeer(&self) -> bool {
        self.caps.ultrapeer
    }

    pub fn is_guess_capable(&self) -> bool {
        self.caps.guess_capable
    }

    pub fn is_guess_ultrapeer(&self) -> bool {
        self.caps.guess_capable && self.caps.ultrapeer
    }

    pub fn is_temp_connection(&self) -> bool {
        self.caps.temp_connection
    }

    /// Presence of `GGEP`; the version value is ignored.
    pub fn supports_ggep(&self) -> bool {
        self.caps.ggep
    }

    /// Advertised vendor message version, `0.0` when missing.
    pub fn supports_vendor_messages(&self) -> f32 {
        self.caps.vendor_messages
    }

    pub fn supports_pong_caching(&self) -> bool {
        self.caps.pong_caching
    }

    pub fn is_query_routing_enabled(&self) -> bool {
        self.caps.query_routing
    }

    pub fn is_dynamic_query_connection(&self) -> bool {
        self.caps.dynamic_query
    }

    pub fn supports_probe_queries(&self) -> bool {
        self.caps.probe_queries
    }

    pub fn no_requerying(&self) -> bool {
        self.caps.no_requerying
    }

    pub fn is_crawler(&self) -> bool {
        self.caps.crawler
    }

    /// `X-Locale-Pref` as sent, if any.
    pub fn locale_pref(&self) -> Option<&str> {
        self.headers.get(headers::X_LOCALE_PREF).filter(|l| !l.is_empty())
    }

    pub fn locale_pref_or<'a>(&'a self, default_locale: &'a str) -> &'a str {
        self.locale_pref().unwrap_or(default_locale)
    }

    /// Port after the first `:` of `Listen-IP`.
    pub fn listening_port(&self) -> Option<u16> {
        self.caps.listen_port
    }
}

impl fmt::Display for HandshakeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>{}", self.status_code, self.status_message, self.headers)
    }
}

/// `ip:port,ip:port,...` capped at [`NUM_X_TRY_ULTRAPEER_HOSTS`].
pub fn endpoint_string(hosts: &[SocketAddr]) -> String {
    endpoint_string_limited(hosts, NUM_X_TRY_ULTRAPEER_HOSTS)
}

/// `ip:port,ip:port,...` for at most `limit` hosts, in the given order.
pub fn endpoint_string_limited(hosts: &[SocketAddr], limit: usize) -> String {
    hosts
        .iter()
        .take(limit)
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_endpoints(value: &str) -> Vec<SocketAddr> {
    value
        .split(',')
        .filter_map(|e| e.trim().parse::<SocketAddr>().ok())
        .collect()
}

/// `"200"` out of `"200 OK"`.
pub fn extract_code(line: &str) -> Option<u16> {
    let idx = line.find(' ')?;
    line[..idx].trim().parse().ok()
}

/// `"OK"` out of `"200 OK"`.
pub fn extract_message(line: &str) -> Option<&str> {
    let idx = line.find(' ')?;
    Some(line[idx..].trim())
}

fn is_true_value(h: &HeaderSet, name: &str) -> bool {
    h.get(name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn is_false_value(h: &HeaderSet, name: &str) -> bool {
    h.get(name).is_some_and(|v| v.eq_ignore_ascii_case("false"))
}

fn is_string_value(h: &HeaderSet, name: &str, expected: &str) -> bool {
    h.get(name).is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

/// Case-insensitive match against the whole value or any comma-separated token.
fn contains_string_value(h: &HeaderSet, name: &str, expected: &str) -> bool {
    let Some(value) = h.get(name) else {
        return false;
    };
    value.eq_ignore_ascii_case(expected)
        || value
            .split(',')
            .filter(|t| !t.is_empty())
            .any(|t| t.eq_ignore_ascii_case(expected))
}

fn float_value(h: &HeaderSet, name: &str) -> Option<f32> {
    h.get(name).and_then(|v| v.trim().parse::<f32>().ok())
}

fn is_version_or_higher(h: &HeaderSet, name: &str) -> bool {
    float_value(h, name).is_some_and(|v| v >= MIN_FEATURE_VERSION)
}

fn int_value(h: &HeaderSet, name: &str) -> Option<i32> {
    h.get(name).and_then(|v| v.parse().ok())
}

fn int_value_after(h: &HeaderSet, name: &str, token: char) -> Option<i32> {
    let value = h.get(name)?;
    let idx = value.find(token)? + token.len_utf8();
    if idx == value.len() {
        return None;
    }
    value[idx..].parse().ok()
}
