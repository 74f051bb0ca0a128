//! Round-trip / boundary checks for the SOCKS5 wire parsers, driven as
//! a caller outside the crate would: encode bytes by hand (the way a
//! real client would), feed them to the parser, and check the parsed
//! record matches what was encoded.

use socks5_proto::address::DestAddr;
use socks5_proto::reply::{encode_reply, ReplyStatus};
use socks5_proto::request::{parse_request, Command};
use socks5_proto::{auth, hello, ParseResult};
use std::net::{Ipv4Addr, Ipv6Addr};

#[test]
fn hello_reply_roundtrips_through_the_parser_shape() {
    let reply = hello::encode_hello_reply(hello::METHOD_USERPASS);
    assert_eq!(reply, [0x05, 0x02]);
}

#[test]
fn auth_reply_roundtrips_through_the_parser_shape() {
    assert_eq!(auth::encode_auth_reply(true), [0x01, 0x00]);
    assert_eq!(auth::encode_auth_reply(false), [0x01, 0x01]);
}

#[test]
fn ipv4_request_roundtrips() {
    let mut buf = vec![0x05, 0x01, 0x00, 0x01];
    buf.extend_from_slice(&Ipv4Addr::new(8, 8, 8, 8).octets());
    buf.extend_from_slice(&53u16.to_be_bytes());
    let ParseResult::Complete(req, n) = parse_request(&buf) else { panic!("expected Complete") };
    assert_eq!(n, buf.len());
    assert_eq!(req.cmd, Command::Connect);
    assert_eq!(req.dest, DestAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    assert_eq!(req.port, 53);
}

#[test]
fn ipv6_request_roundtrips() {
    let addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
    let mut buf = vec![0x05, 0x01, 0x00, 0x04];
    buf.extend_from_slice(&addr.octets());
    buf.extend_from_slice(&443u16.to_be_bytes());
    let ParseResult::Complete(req, n) = parse_request(&buf) else { panic!("expected Complete") };
    assert_eq!(n, buf.len());
    assert_eq!(req.dest, DestAddr::V6(addr));
}

#[test]
fn domain_request_roundtrips_for_boundary_lengths() {
    for len in [1usize, 255] {
        let name: String = "a".repeat(len);
        let mut buf = vec![0x05, 0x01, 0x00, 0x03, len as u8];
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&80u16.to_be_bytes());
        let ParseResult::Complete(req, n) = parse_request(&buf) else { panic!("expected Complete for len={len}") };
        assert_eq!(n, buf.len());
        assert_eq!(req.dest, DestAddr::Domain(name));
    }
}

#[test]
fn reply_roundtrips_for_both_bound_address_families() {
    let v4 = encode_reply(ReplyStatus::Succeeded, &DestAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
    assert_eq!(v4.len(), 10);
    let v6 = encode_reply(ReplyStatus::Succeeded, &DestAddr::V6(Ipv6Addr::UNSPECIFIED), 0);
    assert_eq!(v6.len(), 22);
}

#[test]
fn hello_parser_tolerates_split_reads() {
    let full = [0x05u8, 0x02, 0x00, 0x02];
    assert_eq!(hello::parse_hello(&full[..1]), ParseResult::Incomplete);
    assert_eq!(hello::parse_hello(&full[..3]), ParseResult::Incomplete);
    assert!(matches!(hello::parse_hello(&full), ParseResult::Complete(_, 4)));
}
