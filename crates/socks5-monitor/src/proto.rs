//! Monitor wire format.
//!
//! Request: `VER | TOKEN(16) | METHOD | TARGET | DLEN(u16 BE) | DATA`
//! Response: `STATUS | DLEN(u16 BE) | DATA`
//!
//! `GET` targets carry no request data. `CONFIG` targets carry a
//! target-specific payload: a single on/off byte for the disector
//! toggle, `user\0pass` for adding a proxy user, a bare username for
//! either deletion target, and `user\0` followed by 16 raw token bytes
//! for adding an admin.

pub const VERSION: u8 = 0x01;
pub const TOKEN_LEN: usize = 16;
const HEADER_LEN: usize = 1 + TOKEN_LEN + 1 + 1 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get = 0x00,
    Config = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetTarget {
    HistoricConnections = 0x00,
    CurrentConnections = 0x01,
    TransferredBytes = 0x02,
    ProxyUsersList = 0x03,
    AdminUsersList = 0x04,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTarget {
    ToggleDisector = 0x00,
    AddProxyUser = 0x01,
    DelProxyUser = 0x02,
    AddAdminUser = 0x03,
    DelAdminUser = 0x04,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    InvalidVersion = 0x01,
    InvalidMethod = 0x02,
    InvalidTarget = 0x03,
    InvalidData = 0x04,
    InvalidAuth = 0x05,
    ServerError = 0x06,
}

/// A request after header parsing but before semantic validation — the
/// token is extracted first so authentication can be checked before
/// method/target bytes are trusted at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub token: [u8; TOKEN_LEN],
    pub method: u8,
    pub target: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    Incomplete,
    Invalid,
    Complete(RawRequest, usize),
}

pub fn parse_request(buf: &[u8]) -> ParseOutcome {
    if buf.len() < HEADER_LEN {
        return ParseOutcome::Incomplete;
    }
    if buf[0] != VERSION {
        return ParseOutcome::Invalid;
    }
    let mut token = [0u8; TOKEN_LEN];
    token.copy_from_slice(&buf[1..1 + TOKEN_LEN]);
    let method = buf[1 + TOKEN_LEN];
    let target = buf[2 + TOKEN_LEN];
    let dlen = u16::from_be_bytes([buf[3 + TOKEN_LEN], buf[4 + TOKEN_LEN]]) as usize;
    let total = HEADER_LEN + dlen;
    if buf.len() < total {
        return ParseOutcome::Incomplete;
    }
    let data = buf[HEADER_LEN..total].to_vec();
    ParseOutcome::Complete(RawRequest { token, method, target, data }, total)
}

/// A fully validated, semantically-typed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorRequest {
    Get(GetTarget),
    ToggleDisector(bool),
    AddProxyUser { user: String, pass: String },
    DelProxyUser { user: String },
    AddAdminUser { user: String, token: [u8; TOKEN_LEN] },
    DelAdminUser { user: String },
}

pub fn interpret(raw: &RawRequest) -> Result<MonitorRequest, Status> {
    match raw.method {
        m if m == Method::Get as u8 => {
            let target = match raw.target {
                t if t == GetTarget::HistoricConnections as u8 => GetTarget::HistoricConnections,
                t if t == GetTarget::CurrentConnections as u8 => GetTarget::CurrentConnections,
                t if t == GetTarget::TransferredBytes as u8 => GetTarget::TransferredBytes,
                t if t == GetTarget::ProxyUsersList as u8 => GetTarget::ProxyUsersList,
                t if t == GetTarget::AdminUsersList as u8 => GetTarget::AdminUsersList,
                _ => return Err(Status::InvalidTarget),
            };
            Ok(MonitorRequest::Get(target))
        }
        m if m == Method::Config as u8 => interpret_config(raw),
        _ => Err(Status::InvalidMethod),
    }
}

fn interpret_config(raw: &RawRequest) -> Result<MonitorRequest, Status> {
    match raw.target {
        t if t == ConfigTarget::ToggleDisector as u8 => {
            if raw.data.len() != 1 {
                return Err(Status::InvalidData);
            }
            Ok(MonitorRequest::ToggleDisector(raw.data[0] != 0))
        }
        t if t == ConfigTarget::AddProxyUser as u8 => {
            let (user, pass) = split_once_nul(&raw.data).ok_or(Status::InvalidData)?;
            if !is_alphanumeric_and_nonempty(&user) || !is_alphanumeric_and_nonempty(&pass) {
                return Err(Status::InvalidData);
            }
            Ok(MonitorRequest::AddProxyUser { user, pass })
        }
        t if t == ConfigTarget::DelProxyUser as u8 => {
            let user = String::from_utf8(raw.data.clone()).map_err(|_| Status::InvalidData)?;
            Ok(MonitorRequest::DelProxyUser { user })
        }
        t if t == ConfigTarget::AddAdminUser as u8 => {
            let sep = raw.data.iter().position(|&b| b == 0).ok_or(Status::InvalidData)?;
            if raw.data.len() != sep + 1 + TOKEN_LEN {
                return Err(Status::InvalidData);
            }
            let user = String::from_utf8(raw.data[..sep].to_vec()).map_err(|_| Status::InvalidData)?;
            let mut token = [0u8; TOKEN_LEN];
            token.copy_from_slice(&raw.data[sep + 1..]);
            Ok(MonitorRequest::AddAdminUser { user, token })
        }
        t if t == ConfigTarget::DelAdminUser as u8 => {
            let user = String::from_utf8(raw.data.clone()).map_err(|_| Status::InvalidData)?;
            Ok(MonitorRequest::DelAdminUser { user })
        }
        _ => Err(Status::InvalidTarget),
    }
}

fn is_alphanumeric_and_nonempty(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn split_once_nul(data: &[u8]) -> Option<(String, String)> {
    let pos = data.iter().position(|&b| b == 0)?;
    let user = String::from_utf8(data[..pos].to_vec()).ok()?;
    let pass = String::from_utf8(data[pos + 1..].to_vec()).ok()?;
    Some((user, pass))
}

pub fn encode_response(status: Status, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + data.len());
    out.push(status as u8);
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(method: u8, target: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = vec![VERSION];
        buf.extend_from_slice(&[0xAAu8; TOKEN_LEN]);
        buf.push(method);
        buf.push(target);
        buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn parses_get_request_with_no_data() {
        let buf = header(Method::Get as u8, GetTarget::HistoricConnections as u8, &[]);
        match parse_request(&buf) {
            ParseOutcome::Complete(raw, n) => {
                assert_eq!(n, buf.len());
                assert_eq!(raw.token, [0xAAu8; TOKEN_LEN]);
                assert_eq!(interpret(&raw), Ok(MonitorRequest::Get(GetTarget::HistoricConnections)));
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_before_full_header() {
        let buf = vec![VERSION, 0, 0];
        assert_eq!(parse_request(&buf), ParseOutcome::Incomplete);
    }

    #[test]
    fn parses_add_proxy_user_config() {
        let data = b"alice\0hunter2".to_vec();
        let buf = header(Method::Config as u8, ConfigTarget::AddProxyUser as u8, &data);
        let ParseOutcome::Complete(raw, _) = parse_request(&buf) else { panic!() };
        assert_eq!(
            interpret(&raw),
            Ok(MonitorRequest::AddProxyUser { user: "alice".into(), pass: "hunter2".into() })
        );
    }

    #[test]
    fn parses_add_admin_user_config() {
        let mut data = b"carol\0".to_vec();
        data.extend_from_slice(&[7u8; TOKEN_LEN]);
        let buf = header(Method::Config as u8, ConfigTarget::AddAdminUser as u8, &data);
        let ParseOutcome::Complete(raw, _) = parse_request(&buf) else { panic!() };
        assert_eq!(
            interpret(&raw),
            Ok(MonitorRequest::AddAdminUser { user: "carol".into(), token: [7u8; TOKEN_LEN] })
        );
    }

    #[test]
    fn add_proxy_user_rejects_non_alphanumeric() {
        let data = b"al ice\0hunter2".to_vec();
        let buf = header(Method::Config as u8, ConfigTarget::AddProxyUser as u8, &data);
        let ParseOutcome::Complete(raw, _) = parse_request(&buf) else { panic!() };
        assert_eq!(interpret(&raw), Err(Status::InvalidData));
    }

    #[test]
    fn invalid_target_reports_status() {
        let buf = header(Method::Get as u8, 0xFF, &[]);
        let ParseOutcome::Complete(raw, _) = parse_request(&buf) else { panic!() };
        assert_eq!(interpret(&raw), Err(Status::InvalidTarget));
    }

    #[test]
    fn response_roundtrip_shape() {
        let bytes = encode_response(Status::Ok, b"hello");
        assert_eq!(bytes[0], Status::Ok as u8);
        assert_eq!(u16::from_be_bytes([bytes[1], bytes[2]]), 5);
        assert_eq!(&bytes[3..], b"hello");
    }
}
