use gnut_api::{
    codec::{encode_block, BlockDecoder, GNUTELLA_CONNECT_06},
    headers::{self, HeaderSet},
    limits::{HeaderLimits, LimitError, MAX_HEADERS, MAX_LINE_LEN},
    HandshakeError,
};

fn decode_all(bytes: &[u8], limits: HeaderLimits) -> Result<Option<gnut_api::HeaderBlock>, HandshakeError> {
    let mut d = BlockDecoder::new(limits);
    d.extend(bytes);
    d.next_block()
}

#[test]
fn round_trip_overwrites_remote_ip() {
    let mut h = HeaderSet::new();
    h.insert(headers::USER_AGENT, "gnutd/0.1.0");
    h.insert(headers::REMOTE_IP, "6.6.6.6");
    h.insert(headers::X_ULTRAPEER, "False");

    let encoded = encode_block(GNUTELLA_CONNECT_06, &h, "10.1.2.3");
    assert_eq!(encoded.written.get(headers::REMOTE_IP), Some("10.1.2.3"));

    let block = decode_all(&encoded.bytes, HeaderLimits::default()).unwrap().expect("block");
    assert_eq!(block.start_line, GNUTELLA_CONNECT_06);
    assert_eq!(block.headers, encoded.written);
    assert_eq!(block.headers.get(headers::USER_AGENT), Some("gnutd/0.1.0"));
    assert_eq!(block.headers.get(headers::REMOTE_IP), Some("10.1.2.3"));
}

#[test]
fn wire_format_is_exact() {
    let h: HeaderSet = [(headers::X_ULTRAPEER, "True"), (headers::X_DEGREE, "32")].into_iter().collect();
    let encoded = encode_block("GNUTELLA/0.6 200 OK", &h, "1.2.3.4");
    assert_eq!(
        String::from_utf8(encoded.bytes).unwrap(),
        "GNUTELLA/0.6 200 OK\r\nX-Ultrapeer: True\r\nX-Degree: 32\r\n\r\n"
    );
}

#[test]
fn malformed_lines_are_skipped() {
    let raw = b"GNUTELLA CONNECT/0.6\r\nno colon here\r\n  X-Degree :  32  \r\nUser-Agent: a:b\r\n\r\n";
    let block = decode_all(raw, HeaderLimits::default()).unwrap().expect("block");
    assert_eq!(block.headers.len(), 2);
    assert_eq!(block.headers.get(headers::X_DEGREE), Some("32"));
    assert_eq!(block.headers.get(headers::USER_AGENT), Some("a:b"));
}

#[test]
fn too_many_headers_is_fatal() {
    let mut raw = b"GNUTELLA CONNECT/0.6\r\n".to_vec();
    for i in 0..=MAX_HEADERS {
        raw.extend_from_slice(format!("X-Filler-{i}: {i}\r\n").as_bytes());
    }
    raw.extend_from_slice(b"\r\n");
    let err = decode_all(&raw, HeaderLimits::default()).expect_err("too many headers");
    assert!(matches!(
        err,
        HandshakeError::Limit(LimitError::TooManyHeaders { max: MAX_HEADERS, .. })
    ));
}

#[test]
fn exactly_max_headers_is_fine() {
    let mut raw = b"GNUTELLA CONNECT/0.6\r\n".to_vec();
    for i in 0..MAX_HEADERS {
        raw.extend_from_slice(format!("X-Filler-{i}: {i}\r\n").as_bytes());
    }
    raw.extend_from_slice(b"\r\n");
    let block = decode_all(&raw, HeaderLimits::default()).unwrap().expect("block");
    assert_eq!(block.headers.len(), MAX_HEADERS);
}

#[test]
fn long_line_is_fatal_not_truncated() {
    let mut raw = b"GNUTELLA CONNECT/0.6\r\nX-Fill: ".to_vec();
    raw.extend(std::iter::repeat(b'a').take(MAX_LINE_LEN));
    raw.extend_from_slice(b"\r\n\r\n");
    let err = decode_all(&raw, HeaderLimits::default()).expect_err("line too long");
    assert!(matches!(err, HandshakeError::Limit(LimitError::LineTooLong { max: MAX_LINE_LEN, .. })));
}

#[test]
fn bare_newlines_are_tolerated() {
    let block = decode_all(b"GNUTELLA/0.6 200 OK\nX-Ultrapeer: True\n\n", HeaderLimits::default())
        .unwrap()
        .expect("block");
    assert_eq!(block.start_line, "GNUTELLA/0.6 200 OK");
    assert_eq!(block.headers.get(headers::X_ULTRAPEER), Some("True"));
}

#[test]
fn bytes_after_block_are_kept() {
    let mut d = BlockDecoder::new(HeaderLimits::default());
    d.extend(b"GNUTELLA/0.6 200 OK\r\n\r\n\x01\x02\x03");
    assert!(d.next_block().unwrap().is_some());
    assert_eq!(d.take_remaining(), vec![1, 2, 3]);
    assert!(d.buffered().is_empty());
}
