//! The nine SOCKS5 session states (plus the two terminal ones), kept as
//! plain constants rather than a Rust `enum` so their numeric identity
//! matches the generic state-machine runtime's "id equals table index"
//! convention used elsewhere in this workspace, even though `Session`
//! dispatches on them directly rather than through
//! `socks5_reactor::stm::StateMachine` (see `session.rs` for why).

pub const HELLO_READ: u32 = 0;
pub const HELLO_WRITE: u32 = 1;
pub const AUTH_READ: u32 = 2;
pub const AUTH_WRITE: u32 = 3;
pub const REQUEST_READ: u32 = 4;
pub const REQUEST_RESOLV: u32 = 5;
pub const REQUEST_CONNECTING: u32 = 6;
pub const REQUEST_WRITE: u32 = 7;
pub const COPY: u32 = 8;
pub const DONE: u32 = 9;
pub const ERROR: u32 = 10;

pub fn name(state: u32) -> &'static str {
    match state {
        HELLO_READ => "HELLO_READ",
        HELLO_WRITE => "HELLO_WRITE",
        AUTH_READ => "AUTH_READ",
        AUTH_WRITE => "AUTH_WRITE",
        REQUEST_READ => "REQUEST_READ",
        REQUEST_RESOLV => "REQUEST_RESOLV",
        REQUEST_CONNECTING => "REQUEST_CONNECTING",
        REQUEST_WRITE => "REQUEST_WRITE",
        COPY => "COPY",
        DONE => "DONE",
        ERROR => "ERROR",
        _ => "UNKNOWN",
    }
}
