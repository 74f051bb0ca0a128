//! The nine-state SOCKS5 per-connection session.
//!
//! `Session` never calls a socket syscall and never touches the
//! reactor: every `on_*` method takes bytes (or a byte count) the
//! caller already moved and returns a `Vec<Command>` describing what
//! to do next. This mirrors `socks5_monitor::MonitorSession`'s
//! `recv_target()`/`on_received(n)` shape, stretched across the richer
//! nine-state negotiation-then-copy lifecycle instead of a single
//! read-process-write cycle.
//!
//! State ids live in [`crate::states`]; this file dispatches on them
//! directly with a `match` rather than through
//! `socks5_reactor::stm::StateMachine` because several transitions
//! (REQUEST_CONNECTING's happy-eyeballs fallback, COPY's independent
//! half-duplex masks) need more context passed in and out of a hook
//! than `fn(&mut Ctx) -> u32` can carry, and because two physically
//! distinct fds (client, origin) drive the same session concurrently
//! once REQUEST_CONNECTING is reached — something the single-current-fd
//! generic machine doesn't model.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::io::RawFd;

use socks5_buffer::Buffer;
use socks5_proto::address::DestAddr;
use socks5_proto::pop3::{CopyObserver, Direction, Pop3Disector};
use socks5_proto::reply::ReplyStatus;
use socks5_proto::{auth, hello, request, ParseResult, ProtoError};
use socks5_reactor::selector::{NOOP, READ, WRITE};
use socks5_runtime::SharedRuntime;

use crate::command::Command;
use crate::copy::Copy;
use crate::resolve::ResolveSlot;
use crate::states;

const NEGOTIATION_READ_BUF: usize = 512;
const NEGOTIATION_WRITE_BUF: usize = 64;
const COPY_SCRATCH: usize = 0x4000;

pub struct Session {
    client_fd: RawFd,
    client_addr: SocketAddr,
    origin_fd: Option<RawFd>,
    state: u32,

    read_buf: Buffer,
    write_buf: Buffer,

    auth_required: bool,
    selected_method: u8,
    auth_success: bool,
    uname: Option<String>,

    dest: Option<DestAddr>,
    dest_port: u16,
    by_domain: bool,
    resolve_candidates: Vec<SocketAddr>,
    resolve_cursor: usize,
    resolve_slot: ResolveSlot,

    reply_status: Option<ReplyStatus>,
    established: bool,

    copy: Copy,
    scratch: Box<[u8; COPY_SCRATCH]>,
    pop3: Pop3Disector,
}

impl Session {
    pub fn new(client_fd: RawFd, client_addr: SocketAddr) -> Self {
        Self {
            client_fd,
            client_addr,
            origin_fd: None,
            state: states::HELLO_READ,
            read_buf: Buffer::new(NEGOTIATION_READ_BUF),
            write_buf: Buffer::new(NEGOTIATION_WRITE_BUF),
            auth_required: false,
            selected_method: hello::METHOD_NO_AUTH,
            auth_success: false,
            uname: None,
            dest: None,
            dest_port: 0,
            by_domain: false,
            resolve_candidates: Vec::new(),
            resolve_cursor: 0,
            resolve_slot: ResolveSlot::new(),
            reply_status: None,
            established: false,
            copy: Copy::new(),
            scratch: Box::new([0u8; COPY_SCRATCH]),
            pop3: Pop3Disector::new(false),
        }
    }

    pub fn client_fd(&self) -> RawFd {
        self.client_fd
    }

    pub fn origin_fd(&self) -> Option<RawFd> {
        self.origin_fd
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, states::DONE | states::ERROR)
    }

    pub fn uname(&self) -> Option<&str> {
        self.uname.as_deref()
    }

    /// Clone of the cross-thread slot this session's DNS lookup (if any)
    /// will publish into. The caller passes this to `dns::spawn_lookup`
    /// when it sees `Command::SpawnDnsLookup`.
    pub fn resolve_slot(&self) -> ResolveSlot {
        self.resolve_slot.clone()
    }

    // ---- buffer access -------------------------------------------------

    pub fn client_recv_target(&mut self) -> &mut [u8] {
        match self.state {
            states::HELLO_READ | states::AUTH_READ | states::REQUEST_READ => self.read_buf.write_slice(),
            states::COPY => &mut self.scratch[..],
            _ => &mut [],
        }
    }

    pub fn client_send_source(&self) -> &[u8] {
        match self.state {
            states::HELLO_WRITE | states::AUTH_WRITE | states::REQUEST_WRITE => self.write_buf.read_slice(),
            states::COPY => self.copy.o2c.read_slice(),
            _ => &[],
        }
    }

    pub fn origin_recv_target(&mut self) -> &mut [u8] {
        match self.state {
            states::COPY => &mut self.scratch[..],
            _ => &mut [],
        }
    }

    pub fn origin_send_source(&self) -> &[u8] {
        match self.state {
            states::COPY => self.copy.c2o.read_slice(),
            _ => &[],
        }
    }

    // ---- client fd events ----------------------------------------------

    /// `n == 0` means EOF, matching the `recv()`-return-0 convention.
    pub fn on_client_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        match self.state {
            states::HELLO_READ => self.handle_hello_read(n, shared),
            states::AUTH_READ => self.handle_auth_read(n, shared),
            states::REQUEST_READ => self.handle_request_read(n, shared),
            states::COPY => self.handle_copy_client_read(n, shared),
            _ => Vec::new(),
        }
    }

    pub fn on_client_sent(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        match self.state {
            states::HELLO_WRITE => self.handle_hello_write(n),
            states::AUTH_WRITE => self.handle_auth_write(n),
            states::REQUEST_WRITE => self.handle_request_write(n, shared),
            states::COPY => {
                self.copy.o2c.advance_read(n);
                if n > 0 {
                    shared.counters.add_transferred(n as u32);
                }
                self.copy_tick(shared)
            }
            _ => Vec::new(),
        }
    }

    // ---- origin fd events ------------------------------------------------

    pub fn on_origin_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        match self.state {
            states::COPY => self.handle_copy_origin_read(n, shared),
            _ => Vec::new(),
        }
    }

    pub fn on_origin_sent(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        match self.state {
            states::COPY => {
                self.copy.c2o.advance_read(n);
                if n > 0 {
                    shared.counters.add_transferred(n as u32);
                }
                self.copy_tick(shared)
            }
            _ => Vec::new(),
        }
    }

    /// REQUEST_CONNECTING: the origin fd became writable. The caller has
    /// already read `SO_ERROR` (0 == connect succeeded) and passes the
    /// raw errno through.
    pub fn on_origin_connect_result(&mut self, errno: i32, shared: &mut SharedRuntime) -> Vec<Command> {
        if self.state != states::REQUEST_CONNECTING {
            return Vec::new();
        }
        if errno == 0 {
            return self.start_request_write(ReplyStatus::Succeeded, shared);
        }
        if self.by_domain && self.resolve_cursor + 1 < self.resolve_candidates.len() {
            self.resolve_cursor += 1;
            let mut cmds = vec![Command::CloseOrigin];
            self.origin_fd = None;
            cmds.push(self.begin_connect_cmd());
            cmds
        } else {
            self.start_request_write(ReplyStatus::from_errno(errno), shared)
        }
    }

    /// The caller executed a `Command::BeginConnect` and is reporting
    /// the outcome: `in_progress == true` for the expected `EINPROGRESS`
    /// case, `false` if `connect()` somehow returned success
    /// synchronously. The latter can't happen to a socket that was made
    /// non-blocking before `connect()` was called — a caller reporting
    /// it anyway is a programmer error, not a runtime condition.
    pub fn on_connect_opened(&mut self, fd: RawFd, in_progress: bool) -> Vec<Command> {
        assert!(in_progress, "origin connect() succeeded synchronously on a non-blocking socket");
        self.origin_fd = Some(fd);
        vec![Command::RegisterOrigin { fd, interest: WRITE }]
    }

    /// REQUEST_RESOLV: a background DNS lookup finished and the reactor
    /// drained the notification. Tolerates a spurious call (the slot
    /// empty, or not currently resolving) since a stale notify can
    /// arrive after teardown.
    pub fn on_block_ready(&mut self, shared: &mut SharedRuntime) -> Vec<Command> {
        if self.state != states::REQUEST_RESOLV {
            return Vec::new();
        }
        match self.resolve_slot.take() {
            None => Vec::new(),
            Some(Err(_)) => self.start_request_write(ReplyStatus::HostUnreachable, shared),
            Some(Ok(addrs)) if addrs.is_empty() => self.start_request_write(ReplyStatus::HostUnreachable, shared),
            Some(Ok(addrs)) => {
                self.resolve_candidates = addrs;
                self.resolve_cursor = 0;
                self.enter_connecting()
            }
        }
    }

    // ---- HELLO -----------------------------------------------------------

    fn handle_hello_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        if n == 0 {
            return self.enter_error(shared);
        }
        self.read_buf.advance_write(n);
        match hello::parse_hello(self.read_buf.read_slice()) {
            ParseResult::Incomplete => Vec::new(),
            ParseResult::Invalid(_) => self.enter_error(shared),
            ParseResult::Complete(req, used) => {
                self.read_buf.advance_read(used);
                self.auth_required = !shared.users.is_empty();
                self.selected_method = hello::select_method(&req.methods, self.auth_required);
                self.write_buf.write(&hello::encode_hello_reply(self.selected_method));
                self.state = states::HELLO_WRITE;
                vec![Command::SetClientInterest(WRITE)]
            }
        }
    }

    fn handle_hello_write(&mut self, n: usize) -> Vec<Command> {
        self.write_buf.advance_read(n);
        if self.write_buf.can_read() {
            return Vec::new();
        }
        if self.selected_method == hello::METHOD_NO_ACCEPTABLE {
            self.state = states::ERROR;
            return vec![Command::CloseSession];
        }
        self.state = if self.auth_required { states::AUTH_READ } else { states::REQUEST_READ };
        vec![Command::SetClientInterest(READ)]
    }

    // ---- AUTH --------------------------------------------------------------

    fn handle_auth_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        if n == 0 {
            return self.enter_error(shared);
        }
        self.read_buf.advance_write(n);
        match auth::parse_auth(self.read_buf.read_slice()) {
            ParseResult::Incomplete => Vec::new(),
            ParseResult::Invalid(_) => self.enter_error(shared),
            ParseResult::Complete(req, used) => {
                self.read_buf.advance_read(used);
                let matched = shared.users.authenticate(&req.uname, &req.passwd).map(str::to_string);
                self.auth_success = matched.is_some();
                self.uname = matched;
                self.write_buf.write(&auth::encode_auth_reply(self.auth_success));
                self.state = states::AUTH_WRITE;
                vec![Command::SetClientInterest(WRITE)]
            }
        }
    }

    fn handle_auth_write(&mut self, n: usize) -> Vec<Command> {
        self.write_buf.advance_read(n);
        if self.write_buf.can_read() {
            return Vec::new();
        }
        if self.auth_success {
            self.state = states::REQUEST_READ;
            vec![Command::SetClientInterest(READ)]
        } else {
            self.state = states::ERROR;
            vec![Command::CloseSession]
        }
    }

    // ---- REQUEST -------------------------------------------------------------

    fn handle_request_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        if n == 0 {
            return self.enter_error(shared);
        }
        self.read_buf.advance_write(n);
        match request::parse_request(self.read_buf.read_slice()) {
            ParseResult::Incomplete => Vec::new(),
            ParseResult::Invalid(ProtoError::UnsupportedVersion) => self.enter_error(shared),
            ParseResult::Invalid(ProtoError::UnsupportedCommand) => {
                self.start_request_write(ReplyStatus::CommandNotSupported, shared)
            }
            ParseResult::Invalid(ProtoError::UnsupportedAddrType) => {
                self.start_request_write(ReplyStatus::AddrTypeNotSupported, shared)
            }
            ParseResult::Invalid(_) => self.start_request_write(ReplyStatus::GeneralFailure, shared),
            ParseResult::Complete(req, used) => {
                self.read_buf.advance_read(used);
                self.dest_port = req.port;
                match req.dest {
                    DestAddr::V4(addr) => {
                        self.dest = Some(DestAddr::V4(addr));
                        self.by_domain = false;
                        self.resolve_candidates = vec![SocketAddr::new(addr.into(), req.port)];
                        self.resolve_cursor = 0;
                        self.enter_connecting()
                    }
                    DestAddr::V6(addr) => {
                        self.dest = Some(DestAddr::V6(addr));
                        self.by_domain = false;
                        self.resolve_candidates = vec![SocketAddr::new(addr.into(), req.port)];
                        self.resolve_cursor = 0;
                        self.enter_connecting()
                    }
                    DestAddr::Domain(host) => {
                        self.dest = Some(DestAddr::Domain(host.clone()));
                        self.by_domain = true;
                        self.state = states::REQUEST_RESOLV;
                        vec![Command::SetClientInterest(NOOP), Command::SpawnDnsLookup { host, port: req.port }]
                    }
                }
            }
        }
    }

    fn handle_request_write(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        self.write_buf.advance_read(n);
        if self.write_buf.can_read() {
            return Vec::new();
        }
        let status = self.reply_status.unwrap_or(ReplyStatus::GeneralFailure);
        let mut cmds = vec![Command::LogRequest {
            uname: self.uname.clone(),
            client_addr: self.client_addr.to_string(),
            dest: self.dest_display(),
            status: status as u8,
        }];
        if status == ReplyStatus::Succeeded {
            shared.counters.on_connection_established();
            self.established = true;
            self.pop3.set_enabled(shared.pop3_disector_enabled);
            self.state = states::COPY;
            cmds.push(Command::SetClientInterest(self.copy.client_interest()));
            cmds.push(Command::SetOriginInterest(self.copy.origin_interest()));
        } else {
            self.state = states::ERROR;
            cmds.extend(self.teardown(shared));
        }
        cmds
    }

    // ---- origin connect ----------------------------------------------------

    fn enter_connecting(&mut self) -> Vec<Command> {
        self.state = states::REQUEST_CONNECTING;
        vec![Command::SetClientInterest(NOOP), self.begin_connect_cmd()]
    }

    fn begin_connect_cmd(&self) -> Command {
        Command::BeginConnect { addr: self.resolve_candidates[self.resolve_cursor] }
    }

    fn start_request_write(&mut self, status: ReplyStatus, _shared: &mut SharedRuntime) -> Vec<Command> {
        self.reply_status = Some(status);
        let bound = self.bound_dest();
        let bytes = socks5_proto::reply::encode_reply(status, &bound, 0);
        self.write_buf.write(&bytes);
        self.state = states::REQUEST_WRITE;
        vec![Command::SetClientInterest(WRITE)]
    }

    fn bound_dest(&self) -> DestAddr {
        let candidate_is_v6 = matches!(self.resolve_candidates.get(self.resolve_cursor), Some(SocketAddr::V6(_)));
        match &self.dest {
            Some(DestAddr::V4(_)) => DestAddr::V4(Ipv4Addr::UNSPECIFIED),
            Some(DestAddr::V6(_)) => DestAddr::V6(Ipv6Addr::UNSPECIFIED),
            Some(DestAddr::Domain(_)) if candidate_is_v6 => DestAddr::V6(Ipv6Addr::UNSPECIFIED),
            _ => DestAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }

    fn dest_display(&self) -> String {
        match &self.dest {
            Some(DestAddr::V4(a)) => format!("{a}:{}", self.dest_port),
            Some(DestAddr::V6(a)) => format!("[{a}]:{}", self.dest_port),
            Some(DestAddr::Domain(h)) => format!("{h}:{}", self.dest_port),
            None => String::new(),
        }
    }

    // ---- COPY ----------------------------------------------------------------

    fn handle_copy_client_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        if n == 0 {
            self.copy.close_client_read();
        } else {
            self.pop3.set_enabled(shared.pop3_disector_enabled);
            self.pop3.consume(Direction::ClientToOrigin, &self.scratch[..n]);
            self.copy.c2o.write(&self.scratch[..n]);
        }
        self.copy_tick(shared)
    }

    fn handle_copy_origin_read(&mut self, n: usize, shared: &mut SharedRuntime) -> Vec<Command> {
        if n == 0 {
            self.copy.close_origin_read();
        } else {
            self.pop3.set_enabled(shared.pop3_disector_enabled);
            self.pop3.consume(Direction::OriginToClient, &self.scratch[..n]);
            self.copy.o2c.write(&self.scratch[..n]);
        }
        self.copy_tick(shared)
    }

    fn copy_tick(&mut self, shared: &mut SharedRuntime) -> Vec<Command> {
        let mut cmds = Vec::new();
        if let Some(creds) = self.pop3.take_credentials() {
            cmds.push(Command::LogCredentials {
                uname: self.uname.clone(),
                dest: self.dest_display(),
                user: creds.user,
                pass: creds.pass,
            });
        }
        if self.copy.origin_write_should_close() {
            self.copy.close_origin_write();
            cmds.push(Command::ShutdownOriginWrite);
        }
        if self.copy.client_write_should_close() {
            self.copy.close_client_write();
            cmds.push(Command::ShutdownClientWrite);
        }
        if self.copy.is_done() {
            self.state = states::DONE;
            cmds.extend(self.teardown(shared));
            return cmds;
        }
        cmds.push(Command::SetClientInterest(self.copy.client_interest()));
        cmds.push(Command::SetOriginInterest(self.copy.origin_interest()));
        cmds
    }

    // ---- teardown --------------------------------------------------------------

    fn enter_error(&mut self, shared: &mut SharedRuntime) -> Vec<Command> {
        self.state = states::ERROR;
        self.teardown(shared)
    }

    fn teardown(&mut self, shared: &mut SharedRuntime) -> Vec<Command> {
        let mut cmds = Vec::new();
        if self.origin_fd.take().is_some() {
            cmds.push(Command::CloseOrigin);
        }
        if self.established {
            shared.counters.on_connection_closed();
            self.established = false;
        }
        cmds.push(Command::CloseSession);
        cmds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socks5_runtime::SharedRuntime;
    use std::net::{IpAddr, Ipv4Addr as V4};

    fn shared() -> SharedRuntime {
        SharedRuntime::new([0u8; 16])
    }

    fn client_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(V4::new(10, 0, 0, 1)), 54321)
    }

    fn feed(session: &mut Session, bytes: &[u8], shared: &mut SharedRuntime) -> Vec<Command> {
        let target = session.client_recv_target();
        let n = bytes.len().min(target.len());
        target[..n].copy_from_slice(&bytes[..n]);
        session.on_client_read(n, shared)
    }

    #[test]
    fn anonymous_hello_selects_no_auth_and_moves_to_request_read() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        let cmds = feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        assert!(matches!(cmds[0], Command::SetClientInterest(WRITE)));
        assert_eq!(session.client_send_source(), &[0x05, 0x00]);
        let cmds = session.on_client_sent(2, &mut shared);
        assert!(matches!(cmds[0], Command::SetClientInterest(READ)));
        assert_eq!(session.state(), states::REQUEST_READ);
    }

    #[test]
    fn hello_prefers_userpass_once_a_user_exists() {
        let mut shared = shared();
        shared.users.register("alice", "hunter2").unwrap();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x02, 0x00, 0x02], &mut shared);
        assert_eq!(session.client_send_source(), &[0x05, 0x02]);
        session.on_client_sent(2, &mut shared);
        assert_eq!(session.state(), states::AUTH_READ);
    }

    #[test]
    fn no_acceptable_method_tears_down_after_reply_flush() {
        let mut shared = shared();
        shared.users.register("alice", "hunter2").unwrap();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared); // only NO-AUTH offered
        assert_eq!(session.client_send_source(), &[0x05, 0xFF]);
        let cmds = session.on_client_sent(2, &mut shared);
        assert!(matches!(cmds[0], Command::CloseSession));
        assert_eq!(session.state(), states::ERROR);
    }

    #[test]
    fn auth_failure_replies_and_closes() {
        let mut shared = shared();
        shared.users.register("alice", "hunter2").unwrap();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x02], &mut shared);
        session.on_client_sent(2, &mut shared);
        assert_eq!(session.state(), states::AUTH_READ);

        let mut req = vec![0x01, 5];
        req.extend_from_slice(b"alice");
        req.push(5);
        req.extend_from_slice(b"wrong");
        feed(&mut session, &req, &mut shared);
        assert_eq!(session.client_send_source(), &[0x01, 0x01]);
        let cmds = session.on_client_sent(2, &mut shared);
        assert!(matches!(cmds[0], Command::CloseSession));
        assert_eq!(session.state(), states::ERROR);
    }

    #[test]
    fn auth_success_records_uname_and_advances() {
        let mut shared = shared();
        shared.users.register("alice", "hunter2").unwrap();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x02], &mut shared);
        session.on_client_sent(2, &mut shared);

        let mut req = vec![0x01, 5];
        req.extend_from_slice(b"alice");
        req.push(7);
        req.extend_from_slice(b"hunter2");
        feed(&mut session, &req, &mut shared);
        assert_eq!(session.client_send_source(), &[0x01, 0x00]);
        session.on_client_sent(2, &mut shared);
        assert_eq!(session.state(), states::REQUEST_READ);
        assert_eq!(session.uname(), Some("alice"));
    }

    #[test]
    fn ipv4_request_goes_straight_to_connecting() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        session.on_client_sent(2, &mut shared);

        let mut req = vec![0x05, 0x01, 0x00, 0x01];
        req.extend_from_slice(&[127, 0, 0, 1]);
        req.extend_from_slice(&80u16.to_be_bytes());
        let cmds = feed(&mut session, &req, &mut shared);
        assert_eq!(session.state(), states::REQUEST_CONNECTING);
        assert!(cmds.iter().any(|c| matches!(c, Command::BeginConnect { .. })));
    }

    #[test]
    fn domain_request_spawns_dns_lookup() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        session.on_client_sent(2, &mut shared);

        let mut req = vec![0x05, 0x01, 0x00, 0x03, 11];
        req.extend_from_slice(b"example.com");
        req.extend_from_slice(&443u16.to_be_bytes());
        let cmds = feed(&mut session, &req, &mut shared);
        assert_eq!(session.state(), states::REQUEST_RESOLV);
        assert!(cmds.iter().any(|c| matches!(c, Command::SpawnDnsLookup { host, port: 443 } if host == "example.com")));
    }

    #[test]
    fn unsupported_command_replies_with_failure_status_not_abort() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        session.on_client_sent(2, &mut shared);

        let mut req = vec![0x05, 0x02 /* BIND */, 0x00, 0x01];
        req.extend_from_slice(&[127, 0, 0, 1]);
        req.extend_from_slice(&80u16.to_be_bytes());
        feed(&mut session, &req, &mut shared);
        assert_eq!(session.state(), states::REQUEST_WRITE);
        assert_eq!(session.client_send_source()[1], ReplyStatus::CommandNotSupported as u8);
    }

    #[test]
    fn successful_connect_establishes_copy_and_counters() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        session.on_client_sent(2, &mut shared);
        let mut req = vec![0x05, 0x01, 0x00, 0x01];
        req.extend_from_slice(&[127, 0, 0, 1]);
        req.extend_from_slice(&80u16.to_be_bytes());
        feed(&mut session, &req, &mut shared);

        session.on_connect_opened(9, true);
        session.on_origin_connect_result(0, &mut shared);
        assert_eq!(session.state(), states::REQUEST_WRITE);
        assert_eq!(session.client_send_source()[1], ReplyStatus::Succeeded as u8);
        let reply_len = session.client_send_source().len();
        let cmds = session.on_client_sent(reply_len, &mut shared);
        assert_eq!(session.state(), states::COPY);
        assert_eq!(shared.counters.historic_connections(), 1);
        assert_eq!(shared.counters.current_connections(), 1);
        assert!(cmds.iter().any(|c| matches!(c, Command::SetOriginInterest(_))));
    }

    #[test]
    fn connect_refused_falls_back_to_next_dns_candidate() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        session.on_client_sent(2, &mut shared);
        let mut req = vec![0x05, 0x01, 0x00, 0x03, 11];
        req.extend_from_slice(b"example.com");
        req.extend_from_slice(&80u16.to_be_bytes());
        feed(&mut session, &req, &mut shared);

        session.resolve_candidates = vec![
            SocketAddr::new(IpAddr::V4(V4::new(93, 184, 216, 1)), 80),
            SocketAddr::new(IpAddr::V4(V4::new(93, 184, 216, 2)), 80),
        ];
        session.resolve_cursor = 0;
        session.by_domain = true;
        session.state = states::REQUEST_CONNECTING;
        session.on_connect_opened(9, true);

        let cmds = session.on_origin_connect_result(libc::ECONNREFUSED, &mut shared);
        assert!(cmds.iter().any(|c| matches!(c, Command::CloseOrigin)));
        assert!(cmds.iter().any(|c| matches!(c, Command::BeginConnect { .. })));
        assert_eq!(session.state(), states::REQUEST_CONNECTING);
        assert_eq!(session.resolve_cursor, 1);
    }

    #[test]
    fn connect_refused_with_no_more_candidates_replies_failure() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        feed(&mut session, &[0x05, 0x01, 0x00], &mut shared);
        session.on_client_sent(2, &mut shared);
        let mut req = vec![0x05, 0x01, 0x00, 0x01];
        req.extend_from_slice(&[127, 0, 0, 1]);
        req.extend_from_slice(&80u16.to_be_bytes());
        feed(&mut session, &req, &mut shared);
        session.on_connect_opened(9, true);

        session.on_origin_connect_result(libc::ECONNREFUSED, &mut shared);
        assert_eq!(session.state(), states::REQUEST_WRITE);
        assert_eq!(session.client_send_source()[1], ReplyStatus::ConnectionRefused as u8);
    }

    #[test]
    #[should_panic(expected = "synchronously")]
    fn synchronous_connect_success_is_a_programmer_error() {
        let mut session = Session::new(3, client_addr());
        session.on_connect_opened(9, false);
    }

    #[test]
    fn copy_state_shuts_down_peer_write_immediately_on_client_eof() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        session.state = states::COPY;
        session.established = true;
        shared.counters.on_connection_established();

        // Client EOF must clear the origin's WRITE side in the very same
        // tick, with no wait for any buffer to drain first.
        let cmds = session.on_client_read(0, &mut shared);
        assert!(cmds.iter().any(|c| matches!(c, Command::ShutdownOriginWrite)));
    }

    #[test]
    fn copy_state_abandons_undelivered_bytes_on_immediate_shutdown() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        session.state = states::COPY;
        session.established = true;
        shared.counters.on_connection_established();

        // A byte is sitting in c2o, unsent, when the client EOFs. The
        // shutdown still fires immediately rather than waiting for that
        // byte to reach the origin.
        let target = session.client_recv_target();
        target[..3].copy_from_slice(b"abc");
        session.on_client_read(3, &mut shared);
        let cmds = session.on_client_read(0, &mut shared);
        assert!(cmds.iter().any(|c| matches!(c, Command::ShutdownOriginWrite)));
        assert_eq!(session.copy.origin_interest(), socks5_reactor::selector::NOOP);
    }

    #[test]
    fn copy_state_tears_down_once_both_directions_drained_and_closed() {
        let mut shared = shared();
        let mut session = Session::new(3, client_addr());
        session.state = states::COPY;
        session.established = true;
        shared.counters.on_connection_established();

        session.on_client_read(0, &mut shared);
        let cmds = session.on_origin_read(0, &mut shared);
        assert_eq!(session.state(), states::DONE);
        assert!(cmds.iter().any(|c| matches!(c, Command::CloseSession)));
        assert_eq!(shared.counters.current_connections(), 0);
    }
}
