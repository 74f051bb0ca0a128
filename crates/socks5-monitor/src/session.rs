//! Per-connection monitor session: read the request, authenticate and
//! process it, write the response, close. No generic state-machine
//! runtime here — three explicit steps cover the whole lifecycle.

use socks5_buffer::Buffer;
use socks5_runtime::SharedRuntime;

use crate::proto::{self, GetTarget, MonitorRequest, ParseOutcome, Status};

const READ_BUF: usize = 0xFFFF;
const WRITE_BUF: usize = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Reading,
    Writing,
    Done,
}

pub struct MonitorSession {
    read_buf: Buffer,
    write_buf: Buffer,
    state: MonitorState,
}

impl MonitorSession {
    pub fn new() -> Self {
        Self {
            read_buf: Buffer::new(READ_BUF),
            write_buf: Buffer::new(WRITE_BUF),
            state: MonitorState::Reading,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// The slice the caller should `recv()` into.
    pub fn recv_target(&mut self) -> &mut [u8] {
        self.read_buf.write_slice()
    }

    /// The caller read `n` bytes into `recv_target()`'s slice; try to
    /// parse and, on a complete request, process it immediately.
    pub fn on_received(&mut self, n: usize, shared: &mut SharedRuntime) {
        self.read_buf.advance_write(n);
        match proto::parse_request(self.read_buf.read_slice()) {
            ParseOutcome::Incomplete => {}
            ParseOutcome::Invalid => self.respond(Status::InvalidVersion, &[0u8]),
            ParseOutcome::Complete(raw, consumed) => {
                self.read_buf.advance_read(consumed);
                self.process(&raw, shared);
            }
        }
    }

    fn process(&mut self, raw: &proto::RawRequest, shared: &mut SharedRuntime) {
        if !shared.admins.is_admin(&raw.token) {
            self.respond(Status::InvalidAuth, &[]);
            return;
        }

        match proto::interpret(raw) {
            Err(status) => self.respond(status, &[]),
            Ok(request) => self.execute(request, shared),
        }
    }

    fn execute(&mut self, request: MonitorRequest, shared: &mut SharedRuntime) {
        match request {
            MonitorRequest::Get(target) => {
                let data = match target {
                    GetTarget::HistoricConnections => shared.counters.historic_connections().to_be_bytes().to_vec(),
                    GetTarget::CurrentConnections => shared.counters.current_connections().to_be_bytes().to_vec(),
                    GetTarget::TransferredBytes => shared.counters.transferred_bytes().to_be_bytes().to_vec(),
                    GetTarget::ProxyUsersList => shared.users.names_nul_separated(),
                    GetTarget::AdminUsersList => {
                        let mut out = Vec::new();
                        for (i, a) in shared.admins.iter().enumerate() {
                            if i > 0 {
                                out.push(0);
                            }
                            out.extend_from_slice(a.name.as_bytes());
                        }
                        out
                    }
                };
                self.respond(Status::Ok, &data);
            }
            MonitorRequest::ToggleDisector(on) => {
                shared.pop3_disector_enabled = on;
                self.respond(Status::Ok, &[]);
            }
            MonitorRequest::AddProxyUser { user, pass } => match shared.users.register(&user, &pass) {
                Ok(()) => self.respond(Status::Ok, &[]),
                Err(_) => self.respond(Status::InvalidData, &[]),
            },
            MonitorRequest::DelProxyUser { user } => match shared.users.unregister(&user) {
                Ok(()) => self.respond(Status::Ok, &[]),
                Err(_) => self.respond(Status::InvalidData, &[]),
            },
            MonitorRequest::AddAdminUser { user, token } => match shared.admins.register(&user, token) {
                Ok(()) => self.respond(Status::Ok, &[]),
                Err(_) => self.respond(Status::InvalidData, &[]),
            },
            MonitorRequest::DelAdminUser { user } => match shared.admins.unregister(&user) {
                Ok(()) => self.respond(Status::Ok, &[]),
                Err(_) => self.respond(Status::InvalidData, &[]),
            },
        }
    }

    fn respond(&mut self, status: Status, data: &[u8]) {
        let bytes = proto::encode_response(status, data);
        self.write_buf.write(&bytes);
        self.state = MonitorState::Writing;
    }

    pub fn has_pending_write(&self) -> bool {
        self.write_buf.can_read()
    }

    pub fn send_source(&self) -> &[u8] {
        self.write_buf.read_slice()
    }

    pub fn on_sent(&mut self, n: usize) {
        self.write_buf.advance_read(n);
        if !self.write_buf.can_read() {
            self.state = MonitorState::Done;
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == MonitorState::Done
    }
}

impl Default for MonitorSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socks5_runtime::SharedRuntime;

    fn request_bytes(token: [u8; 16], method: u8, target: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = vec![proto::VERSION];
        buf.extend_from_slice(&token);
        buf.push(method);
        buf.push(target);
        buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn rejects_unknown_token() {
        let mut shared = SharedRuntime::new([1u8; 16]);
        let mut session = MonitorSession::new();
        let req = request_bytes([2u8; 16], 0x00, GetTarget::HistoricConnections as u8, &[]);
        let n = session.recv_target().len().min(req.len());
        session.recv_target()[..n].copy_from_slice(&req[..n]);
        session.on_received(n, &mut shared);
        assert!(session.has_pending_write());
        assert_eq!(session.send_source()[0], Status::InvalidAuth as u8);
    }

    #[test]
    fn root_token_can_query_counters() {
        let mut shared = SharedRuntime::new([1u8; 16]);
        shared.counters.on_connection_established();
        let mut session = MonitorSession::new();
        let req = request_bytes([1u8; 16], 0x00, GetTarget::CurrentConnections as u8, &[]);
        let n = req.len();
        session.recv_target()[..n].copy_from_slice(&req);
        session.on_received(n, &mut shared);
        assert_eq!(session.send_source()[0], Status::Ok as u8);
        let dlen = u16::from_be_bytes([session.send_source()[1], session.send_source()[2]]) as usize;
        assert_eq!(dlen, 4);
        let data = &session.send_source()[3..3 + dlen];
        assert_eq!(u32::from_be_bytes(data.try_into().unwrap()), 1);
    }

    #[test]
    fn root_token_can_add_and_list_proxy_users() {
        let mut shared = SharedRuntime::new([1u8; 16]);
        let mut session = MonitorSession::new();
        let req = request_bytes([1u8; 16], 0x01, 0x01, b"alice\0hunter2");
        let n = req.len();
        session.recv_target()[..n].copy_from_slice(&req);
        session.on_received(n, &mut shared);
        assert_eq!(session.send_source()[0], Status::Ok as u8);
        assert_eq!(shared.users.len(), 1);
    }

    #[test]
    fn write_then_done_lifecycle() {
        let mut shared = SharedRuntime::new([1u8; 16]);
        let mut session = MonitorSession::new();
        let req = request_bytes([1u8; 16], 0x00, GetTarget::HistoricConnections as u8, &[]);
        let n = req.len();
        session.recv_target()[..n].copy_from_slice(&req);
        session.on_received(n, &mut shared);
        assert!(!session.is_done());
        let pending = session.send_source().len();
        session.on_sent(pending);
        assert!(session.is_done());
    }
}
