//! RFC 1929 username/password sub-negotiation.

use crate::error::ProtoError;
use crate::ParseResult;

pub const VERSION: u8 = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct AuthRequest {
    pub uname: String,
    pub passwd: String,
}

/// `VER | ULEN | UNAME[ULEN] | PLEN | PASSWD[PLEN]`
pub fn parse_auth(buf: &[u8]) -> ParseResult<AuthRequest> {
    if buf.len() < 2 {
        return ParseResult::Incomplete;
    }
    if buf[0] != VERSION {
        return ParseResult::Invalid(ProtoError::UnsupportedVersion);
    }
    let ulen = buf[1] as usize;
    if buf.len() < 2 + ulen + 1 {
        return ParseResult::Incomplete;
    }
    let plen_pos = 2 + ulen;
    let plen = buf[plen_pos] as usize;
    let total = plen_pos + 1 + plen;
    if buf.len() < total {
        return ParseResult::Incomplete;
    }
    let uname = String::from_utf8_lossy(&buf[2..plen_pos]).into_owned();
    let passwd = String::from_utf8_lossy(&buf[plen_pos + 1..total]).into_owned();
    ParseResult::Complete(AuthRequest { uname, passwd }, total)
}

pub fn encode_auth_reply(success: bool) -> [u8; 2] {
    [VERSION, if success { 0x00 } else { 0x01 }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_auth_request() {
        let mut buf = vec![0x01, 5];
        buf.extend_from_slice(b"alice");
        buf.push(7);
        buf.extend_from_slice(b"hunter2");
        match parse_auth(&buf) {
            ParseResult::Complete(req, n) => {
                assert_eq!(n, buf.len());
                assert_eq!(req.uname, "alice");
                assert_eq!(req.passwd, "hunter2");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_mid_password() {
        let mut buf = vec![0x01, 5];
        buf.extend_from_slice(b"alice");
        buf.push(7);
        buf.extend_from_slice(b"hunt");
        assert_eq!(parse_auth(&buf), ParseResult::Incomplete);
    }

    #[test]
    fn reply_encodes_status_byte() {
        assert_eq!(encode_auth_reply(true), [0x01, 0x00]);
        assert_eq!(encode_auth_reply(false), [0x01, 0x01]);
    }
}
