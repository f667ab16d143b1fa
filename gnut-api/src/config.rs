use std::{str::FromStr, time::Duration};

use crate::limits::{HeaderLimits, MAX_HEADERS, MAX_LINE_LEN};

/// Local handshake settings shared read-only by every connection.
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    pub user_agent: String,
    /// Our locale, advertised as `X-Locale-Pref`.
    pub language: String,
    /// Assumed for peers that do not send `X-Locale-Pref`.
    pub default_locale: String,
    /// Reject outgoing peers whose locale differs from ours.
    pub locale_preferencing: bool,
    /// Advertise `Accept-Encoding: deflate`.
    pub accept_deflate: bool,
    /// Deflate what we send when the peer accepts it.
    pub encode_deflate: bool,
    pub limits: HeaderLimits,
    /// Longest any single step may wait on the socket.
    pub read_timeout: Duration,
    /// Advertised `X-Degree`.
    pub degree: u32,
    /// Advertised `X-Max-TTL`.
    pub max_ttl: u8,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("gnutd/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "en".to_string(),
            default_locale: "en".to_string(),
            locale_preferencing: true,
            accept_deflate: true,
            encode_deflate: true,
            limits: HeaderLimits::default(),
            read_timeout: Duration::from_millis(8_000),
            degree: 32,
            max_ttl: 3,
        }
    }
}

impl HandshakeConfig {
    /// - GNUT_USER_AGENT (default gnutd/<version>)
    /// - GNUT_LANGUAGE (default en)
    /// - GNUT_DEFAULT_LOCALE (default en)
    /// - GNUT_LOCALE_PREFERENCING (bool, default true)
    /// - GNUT_ACCEPT_DEFLATE (bool, default true)
    /// - GNUT_ENCODE_DEFLATE (bool, default true)
    /// - GNUT_MAX_HEADERS (default 30)
    /// - GNUT_MAX_LINE_LEN (default 1024)
    /// - GNUT_READ_TIMEOUT_MS (default 8000)
    /// - GNUT_DEGREE (default 32)
    /// - GNUT_MAX_TTL (default 3)
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(ua) = std::env::var("GNUT_USER_AGENT") {
            cfg.user_agent = ua;
        }
        cfg.language = parse_env_string("GNUT_LANGUAGE", cfg.language);
        cfg.default_locale = parse_env_string("GNUT_DEFAULT_LOCALE", cfg.default_locale);

        cfg.locale_preferencing =
            parse_env_bool("GNUT_LOCALE_PREFERENCING", cfg.locale_preferencing);
        cfg.accept_deflate = parse_env_bool("GNUT_ACCEPT_DEFLATE", cfg.accept_deflate);
        cfg.encode_deflate = parse_env_bool("GNUT_ENCODE_DEFLATE", cfg.encode_deflate);

        cfg.limits.max_headers = parse_env("GNUT_MAX_HEADERS", MAX_HEADERS);
        cfg.limits.max_line_len = parse_env("GNUT_MAX_LINE_LEN", MAX_LINE_LEN);

        if let Some(ms) = env_value::<u64>("GNUT_READ_TIMEOUT_MS") {
            cfg.read_timeout = Duration::from_millis(ms);
        }
        cfg.degree = parse_env("GNUT_DEGREE", cfg.degree);
        cfg.max_ttl = parse_env("GNUT_MAX_TTL", cfg.max_ttl);

        cfg
    }
}

fn parse_env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}

/// Values that are missing or do not fit `T` are ignored.
fn env_value<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env_value(key).unwrap_or(default)
}

pub fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| {
            let s = s.trim().to_ascii_lowercase();
            matches!(s.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(default)
}
