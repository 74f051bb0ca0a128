//! # socks5-session — the SOCKS5 per-connection session
//!
//! [`Session`] drives one client through the nine states: HELLO_READ,
//! HELLO_WRITE, AUTH_READ, AUTH_WRITE, REQUEST_READ, REQUEST_RESOLV,
//! REQUEST_CONNECTING, REQUEST_WRITE, COPY (plus the terminal DONE and
//! ERROR states). It never touches a socket or the reactor directly —
//! every method takes the bytes already moved (`on_client_read(n, ..)`)
//! and returns a list of [`Command`]s describing what the caller (the
//! binary's `Handler` glue, see `cmd/socks5-server`) must do next:
//! register the origin fd, flip an interest mask, spawn a DNS lookup,
//! emit a log line, or tear the session down. Keeping I/O and reactor
//! registration out of `Session` makes its state transitions testable
//! without a live socket.

pub mod command;
pub mod copy;
pub mod dns;
pub mod error;
pub mod resolve;
pub mod session;
pub mod states;

pub use command::Command;
pub use error::{SessionError, SessionResult};
pub use session::Session;
