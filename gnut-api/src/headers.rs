//! Header names exchanged during the Gnutella 0.6 handshake, and the ordered
//! collection each header block is read into or written from.

pub const X_ULTRAPEER: &str = "X-Ultrapeer";
pub const X_TRY_ULTRAPEERS: &str = "X-Try-Ultrapeers";
pub const X_QUERY_ROUTING: &str = "X-Query-Routing";
pub const X_PONG_CACHING: &str = "Pong-Caching";
pub const X_ULTRAPEER_NEEDED: &str = "X-Ultrapeer-Needed";
pub const USER_AGENT: &str = "User-Agent";
pub const X_TEMP_CONNECTION: &str = "X-Temp-Connection";
pub const REMOTE_IP: &str = "Remote-IP";
pub const GGEP: &str = "GGEP";
pub const X_REQUERIES: &str = "X-Requeries";
pub const X_GUESS: &str = "X-Guess";
pub const X_VERSION: &str = "X-Version";
pub const X_DEGREE: &str = "X-Degree";
pub const X_ULTRAPEER_QUERY_ROUTING: &str = "X-Ultrapeer-Query-Routing";
pub const X_VENDOR_MESSAGE: &str = "Vendor-Message";
pub const X_PROBE_QUERIES: &str = "X-Ext-Probes";
pub const X_MAX_TTL: &str = "X-Max-TTL";
pub const X_DYNAMIC_QUERY: &str = "X-Dynamic-Querying";
pub const X_LOCALE_PREF: &str = "X-Locale-Pref";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const CRAWLER: &str = "Crawler";
pub const LEAVES: &str = "Leaves";
pub const PEERS: &str = "Peers";
pub const LISTEN_IP: &str = "Listen-IP";

pub const DEFLATE_VALUE: &str = "deflate";

/// Ordered header map. Names are case-sensitive and hold a single value;
/// re-inserting a name replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Copies every entry of `other` into `self`, later values winning.
    pub fn merge(&mut self, other: &HeaderSet) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl std::fmt::Display for HeaderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}
