//! Commands a [`crate::Session`] hands back to its caller instead of
//! touching sockets or the reactor itself.

use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use socks5_reactor::Interest;

#[derive(Debug)]
pub enum Command {
    /// Open a non-blocking socket toward `addr` and connect it. The
    /// caller owns every syscall `Session` needs but won't make itself
    /// (socket/connect/getsockopt/shutdown/close); it reports the
    /// outcome back through `Session::on_connect_opened`.
    BeginConnect { addr: SocketAddr },
    /// Register the now-connecting origin fd with the reactor.
    RegisterOrigin { fd: RawFd, interest: Interest },
    SetClientInterest(Interest),
    SetOriginInterest(Interest),
    /// Hand a domain name off to a background thread; the result comes
    /// back through `Session::on_block_ready` once the reactor's notify
    /// channel wakes the session's block handler.
    SpawnDnsLookup { host: String, port: u16 },
    CloseOrigin,
    CloseSession,
    /// Half-close: the peer has nothing left to receive from us on this
    /// side but the other direction may still be carrying data.
    ShutdownClientWrite,
    ShutdownOriginWrite,
    LogRequest { uname: Option<String>, client_addr: String, dest: String, status: u8 },
    LogCredentials { uname: Option<String>, dest: String, user: String, pass: String },
}
