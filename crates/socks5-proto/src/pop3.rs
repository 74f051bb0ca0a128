//! Opportunistic POP3 credential sniffer riding the duplex copy path.
//!
//! The original inlines this directly into the copy loop's write path;
//! here it's an observer that the copy loop feeds both directions of
//! traffic through, decoupling protocol sniffing from the transport.
//! `USER`/`PASS` are plaintext lines the client sends; the login isn't
//! considered concluded (and credentials aren't surfaced) until the
//! second server response line — the one answering `PASS` — has been
//! seen on the origin-to-client side, matching the real POP3 exchange:
//!
//! ```text
//! C: USER alice        S: +OK
//! C: PASS hunter2       S: +OK | -ERR   <- concludes the attempt
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToOrigin,
    OriginToClient,
}

/// Fed every chunk of bytes the duplex copy moves, in order, per
/// direction. Implementors must not block and must not mutate the
/// bytes — they only observe.
pub trait CopyObserver {
    fn consume(&mut self, direction: Direction, bytes: &[u8]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pop3Credentials {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingUserAck,
    AwaitingPass,
    AwaitingPassAck,
    Done,
    Incompatible,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

#[derive(Default)]
pub struct Pop3Disector {
    enabled: bool,
    phase: Phase,
    client_line_buf: Vec<u8>,
    origin_line_buf: Vec<u8>,
    user: Option<String>,
    pass: Option<String>,
    found: Option<Pop3Credentials>,
}

impl Pop3Disector {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, ..Default::default() }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns and clears the credential pair once the login attempt
    /// has concluded (the server has answered `PASS`).
    pub fn take_credentials(&mut self) -> Option<Pop3Credentials> {
        self.found.take()
    }

    fn mark_incompatible(&mut self) {
        self.phase = Phase::Incompatible;
        self.user = None;
        self.pass = None;
    }

    fn handle_client_line(&mut self, line: &[u8]) {
        if line.iter().any(|&b| b != b'\r' && b != b'\n' && (b < 0x20 || b >= 0x7f)) {
            self.mark_incompatible();
            return;
        }
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        match self.phase {
            Phase::Idle => {
                if let Some(rest) = strip_ci_prefix(line, "USER ") {
                    self.user = Some(rest.to_string());
                    self.phase = Phase::AwaitingUserAck;
                } else {
                    self.mark_incompatible();
                }
            }
            Phase::AwaitingPass => {
                if let Some(rest) = strip_ci_prefix(line, "PASS ") {
                    self.pass = Some(rest.to_string());
                    self.phase = Phase::AwaitingPassAck;
                } else {
                    self.mark_incompatible();
                }
            }
            // A response is outstanding; any further client command
            // before we've seen it is a framing anomaly for this
            // simple two-step tracker.
            Phase::AwaitingUserAck | Phase::AwaitingPassAck => self.mark_incompatible(),
            Phase::Done | Phase::Incompatible => {}
        }
    }

    fn handle_origin_line(&mut self, _line: &[u8]) {
        match self.phase {
            Phase::AwaitingUserAck => self.phase = Phase::AwaitingPass,
            Phase::AwaitingPassAck => {
                if let (Some(user), Some(pass)) = (self.user.take(), self.pass.take()) {
                    self.found = Some(Pop3Credentials { user, pass });
                }
                self.phase = Phase::Done;
            }
            _ => {}
        }
    }
}

fn strip_ci_prefix<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

impl CopyObserver for Pop3Disector {
    fn consume(&mut self, direction: Direction, bytes: &[u8]) {
        if !self.enabled || matches!(self.phase, Phase::Incompatible) {
            return;
        }
        match direction {
            Direction::ClientToOrigin => {
                for &b in bytes {
                    self.client_line_buf.push(b);
                    if b == b'\n' {
                        let line = std::mem::take(&mut self.client_line_buf);
                        self.handle_client_line(&line);
                    }
                }
            }
            Direction::OriginToClient => {
                for &b in bytes {
                    self.origin_line_buf.push(b);
                    if b == b'\n' {
                        let line = std::mem::take(&mut self.origin_line_buf);
                        self.handle_origin_line(&line);
                    }
                }
            }
        }
    }
}
