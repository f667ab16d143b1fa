use std::net::SocketAddr;

use gnut_api::{
    headers::{self, HeaderSet},
    response::{endpoint_string, endpoint_string_limited, HandshakeResponse},
    status::{self, HandshakeStatus},
    HandshakeError,
};

fn set(pairs: &[(&str, &str)]) -> HeaderSet {
    pairs.iter().copied().collect()
}

fn good_ultrapeer_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        (headers::X_DEGREE, "32"),
        (headers::X_ULTRAPEER_QUERY_ROUTING, "0.1"),
        (headers::X_MAX_TTL, "3"),
        (headers::X_DYNAMIC_QUERY, "0.1"),
    ]
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

#[test]
fn accepted_iff_status_200() {
    let h = set(&[(headers::X_ULTRAPEER, "true")]);
    assert!(HandshakeResponse::with_status(200, "OK", h.clone()).is_accepted());
    assert!(HandshakeResponse::new(h.clone()).is_accepted());
    for code in [0u16, 199, 201, 503, 577, 593] {
        assert!(!HandshakeResponse::with_status(code, "x", h.clone()).is_accepted());
    }
}

#[test]
fn ultrapeer_and_leaf_flags() {
    let up = HandshakeResponse::new(set(&[(headers::X_ULTRAPEER, "TRUE")]));
    assert!(up.is_ultrapeer() && !up.is_leaf());

    let leaf = HandshakeResponse::new(set(&[(headers::X_ULTRAPEER, "False")]));
    assert!(!leaf.is_ultrapeer() && leaf.is_leaf());

    let absent = HandshakeResponse::new(HeaderSet::new());
    assert!(!absent.is_ultrapeer() && !absent.is_leaf());

    let junk = HandshakeResponse::new(set(&[(headers::X_ULTRAPEER, "maybe")]));
    assert!(!junk.is_ultrapeer() && !junk.is_leaf());
}

#[test]
fn numeric_defaults() {
    let r = HandshakeResponse::new(HeaderSet::new());
    assert_eq!(r.max_ttl(), 4);
    assert_eq!(r.num_intra_ultrapeer_connections(), 6);
    assert!(!r.is_high_degree_connection());
    assert_eq!(r.listening_port(), None);
    assert_eq!(r.supports_vendor_messages(), 0.0);

    let r = HandshakeResponse::new(set(&[(headers::X_DEGREE, "15"), (headers::X_VENDOR_MESSAGE, "0.2")]));
    assert_eq!(r.num_intra_ultrapeer_connections(), 15);
    assert!(r.is_high_degree_connection());
    assert_eq!(r.supports_vendor_messages(), 0.2);
}

#[test]
fn feature_version_floors() {
    let r = HandshakeResponse::new(set(&[
        (headers::X_ULTRAPEER_QUERY_ROUTING, "0.1"),
        (headers::X_DYNAMIC_QUERY, "0.09"),
        (headers::X_PROBE_QUERIES, "1"),
        (headers::CRAWLER, "garbage"),
        (headers::X_PONG_CACHING, "0.1"),
        (headers::X_GUESS, "0.1"),
        (headers::X_QUERY_ROUTING, "0.2"),
    ]));
    assert!(r.is_ultrapeer_query_routing_connection());
    assert!(!r.is_dynamic_query_connection());
    assert!(r.supports_probe_queries());
    assert!(!r.is_crawler());
    assert!(r.supports_pong_caching());
    assert!(r.is_guess_capable());
    assert!(!r.is_guess_ultrapeer());
    assert!(r.is_query_routing_enabled());
}

#[test]
fn good_ultrapeer_needs_every_condition() {
    let all = HandshakeResponse::new(good_ultrapeer_headers().into_iter().collect());
    assert!(all.is_good_ultrapeer());

    let breakers = [
        (headers::X_DEGREE, "14"),
        (headers::X_ULTRAPEER_QUERY_ROUTING, "0.0"),
        (headers::X_MAX_TTL, "5"),
        (headers::X_DYNAMIC_QUERY, "0.0"),
    ];
    for (name, bad) in breakers {
        let mut h: HeaderSet = good_ultrapeer_headers().into_iter().collect();
        h.insert(name, bad);
        let r = HandshakeResponse::new(h);
        assert!(!r.is_good_ultrapeer(), "{name}={bad} should break good ultrapeer");
    }
}

#[test]
fn good_leaf_needs_lime_wire_or_no_requerying() {
    let mut h: HeaderSet = good_ultrapeer_headers().into_iter().collect();
    assert!(!HandshakeResponse::new(h.clone()).is_good_leaf());

    h.insert(headers::USER_AGENT, "LimeWire/4.18.8");
    assert!(HandshakeResponse::new(h.clone()).is_good_leaf());

    h.insert(headers::USER_AGENT, "Shareaza 2.7");
    assert!(!HandshakeResponse::new(h.clone()).is_good_leaf());

    h.insert(headers::X_REQUERIES, "False");
    assert!(HandshakeResponse::new(h).is_good_leaf());
}

#[test]
fn accessors_are_stable() {
    let r = HandshakeResponse::new(set(&[(headers::USER_AGENT, "limewire/5.0"), (headers::GGEP, "")]));
    assert_eq!(r.is_lime_wire(), r.is_lime_wire());
    assert!(r.is_lime_wire());
    assert!(r.supports_ggep());
    assert_eq!(r.supports_ggep(), r.supports_ggep());
}

#[test]
fn deflate_negotiation() {
    let r = HandshakeResponse::new(set(&[
        (headers::CONTENT_ENCODING, "DEFLATE"),
        (headers::ACCEPT_ENCODING, "gzip,Deflate"),
    ]));
    assert!(r.is_deflate_enabled());
    assert!(r.is_deflate_accepted(true));
    assert!(!r.is_deflate_accepted(false));
}

#[test]
fn locale_falls_back_to_default() {
    let r = HandshakeResponse::new(HeaderSet::new());
    assert_eq!(r.locale_pref(), None);
    assert_eq!(r.locale_pref_or("en"), "en");
    let r = HandshakeResponse::new(set(&[(headers::X_LOCALE_PREF, "ja")]));
    assert_eq!(r.locale_pref_or("en"), "ja");
}

#[test]
fn temp_connection_and_leaf_guidance() {
    let r = HandshakeResponse::new(set(&[
        (headers::X_TEMP_CONNECTION, "true"),
        (headers::X_ULTRAPEER_NEEDED, "false"),
    ]));
    assert!(r.is_temp_connection());
    assert!(r.has_leaf_guidance());
    assert!(!HandshakeResponse::new(HeaderSet::new()).has_leaf_guidance());
}

#[test]
fn remote_status_line_parsing() {
    let r = HandshakeResponse::from_status_line("503 No Leaf Slots", HeaderSet::new()).unwrap();
    assert_eq!(r.status_code(), 503);
    assert_eq!(r.status_message(), "No Leaf Slots");
    assert_eq!(r.status_line(), "503 No Leaf Slots");

    let err = HandshakeResponse::from_status_line("200", HeaderSet::new()).unwrap_err();
    assert!(matches!(err, HandshakeError::BadStatusLine(_)));
    let err = HandshakeResponse::from_status_line("OK 200", HeaderSet::new()).unwrap_err();
    assert!(matches!(err, HandshakeError::BadStatusLine(_)));
}

#[test]
fn empty_response_is_shared() {
    let a = HandshakeResponse::empty();
    let b = HandshakeResponse::empty();
    assert!(std::ptr::eq(a, b));
    assert!(a.is_accepted());
    assert!(a.headers().is_empty());
}

#[test]
fn endpoint_string_formatting() {
    let hosts = [addr("1.2.3.4:6346"), addr("5.6.7.8:6347")];
    assert_eq!(endpoint_string_limited(&hosts, 10), "1.2.3.4:6346,5.6.7.8:6347");
    assert_eq!(endpoint_string_limited(&hosts, 1), "1.2.3.4:6346");
    assert_eq!(endpoint_string_limited(&[], 10), "");

    let many: Vec<SocketAddr> = (1..=12).map(|i| addr(&format!("10.0.0.{i}:6346"))).collect();
    assert_eq!(endpoint_string(&many).split(',').count(), 10);
}

#[test]
fn rejection_builders() {
    let hosts = [addr("1.2.3.4:6346")];
    let r = HandshakeResponse::reject_incoming(HandshakeStatus::TooManyLeaves, &hosts);
    assert_eq!(r.status_code(), status::SLOTS_FULL);
    assert_eq!(r.status_message(), "No Leaf Slots");
    assert_eq!(r.x_try_ultrapeers(), "1.2.3.4:6346");
    assert_eq!(r.try_ultrapeer_hosts(), hosts.to_vec());

    let r = HandshakeResponse::reject_outgoing(HandshakeStatus::TooManyUltrapeers);
    assert_eq!(r.status_code(), 503);
    assert!(!r.has_x_try_ultrapeers());

    let r = HandshakeResponse::reject_locale();
    assert_eq!(r.status_code(), 577);
    assert_eq!(r.status_message(), status::LOCALE_NO_MATCH_MESSAGE);
}

#[test]
fn crawler_response_lists_everything() {
    let leaves: Vec<SocketAddr> = (1..=12).map(|i| addr(&format!("10.0.0.{i}:6346"))).collect();
    let peers = [addr("9.9.9.9:6346")];
    let r = HandshakeResponse::crawler("gnutd/0.1.0", true, &leaves, &peers);
    assert_eq!(r.status_code(), 593);
    assert_eq!(r.status_message(), "Hi");
    assert_eq!(r.header(headers::X_ULTRAPEER), Some("true"));
    assert_eq!(r.header(headers::LEAVES).unwrap().split(',').count(), 12);
    assert_eq!(r.header(headers::PEERS), Some("9.9.9.9:6346"));
}
