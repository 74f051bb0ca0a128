//! Raw socket setup: listeners, `accept4`, and the `SocketAddr` <->
//! `libc::sockaddr_*` conversions the reactor layer deliberately stays
//! ignorant of. Dual-stack (IPv4 + `IPV6_V6ONLY` IPv6) listeners plus a
//! non-blocking `connect()` path for the origin side of a SOCKS5 session.

use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::io::RawFd;

fn set_reuseaddr(fd: RawFd) -> io::Result<()> {
    let opt: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn sockaddr_in(addr: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = port.to_be();
    sa.sin_addr.s_addr = u32::from_ne_bytes(addr.octets());
    sa
}

fn sockaddr_in6(addr: Ipv6Addr, port: u16) -> libc::sockaddr_in6 {
    let mut sa: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    sa.sin6_port = port.to_be();
    sa.sin6_addr.s6_addr = addr.octets();
    sa
}

/// Binds and listens a non-blocking IPv4 TCP socket.
pub fn listen_v4(addr: Ipv4Addr, port: u16, backlog: i32) -> io::Result<RawFd> {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        if let Err(e) = set_reuseaddr(fd) {
            libc::close(fd);
            return Err(e);
        }
        let sa = sockaddr_in(addr, port);
        if libc::bind(fd, &sa as *const _ as *const libc::sockaddr, mem::size_of_val(&sa) as u32) != 0 {
            let e = io::Error::last_os_error();
            libc::close(fd);
            return Err(e);
        }
        if libc::listen(fd, backlog) != 0 {
            let e = io::Error::last_os_error();
            libc::close(fd);
            return Err(e);
        }
        Ok(fd)
    }
}

/// Binds and listens a non-blocking IPv6 TCP socket with `IPV6_V6ONLY`
/// set, so it coexists with an IPv4 listener bound to the same port.
pub fn listen_v6(addr: Ipv6Addr, port: u16, backlog: i32) -> io::Result<RawFd> {
    unsafe {
        let fd = libc::socket(libc::AF_INET6, libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        if let Err(e) = set_reuseaddr(fd) {
            libc::close(fd);
            return Err(e);
        }
        let v6only: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::IPPROTO_IPV6,
            libc::IPV6_V6ONLY,
            &v6only as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) != 0
        {
            let e = io::Error::last_os_error();
            libc::close(fd);
            return Err(e);
        }
        let sa = sockaddr_in6(addr, port);
        if libc::bind(fd, &sa as *const _ as *const libc::sockaddr, mem::size_of_val(&sa) as u32) != 0 {
            let e = io::Error::last_os_error();
            libc::close(fd);
            return Err(e);
        }
        if libc::listen(fd, backlog) != 0 {
            let e = io::Error::last_os_error();
            libc::close(fd);
            return Err(e);
        }
        Ok(fd)
    }
}

/// One `accept4()` call. `None` means `EAGAIN`/`EWOULDBLOCK` — the
/// listener has no more pending connections this tick. Any other error
/// is logged by the caller and treated the same as "nothing to accept"
/// since a broken listener fd is a startup-time concern, not a
/// per-connection one.
pub fn accept_one(listener_fd: RawFd) -> Option<io::Result<(RawFd, SocketAddr)>> {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let fd = unsafe {
        libc::accept4(
            listener_fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
        )
    };
    if fd < 0 {
        let errno = unsafe { *libc::__errno_location() };
        if errno == libc::EAGAIN || errno == libc::EWOULDBLOCK {
            return None;
        }
        return Some(Err(io::Error::from_raw_os_error(errno)));
    }
    Some(Ok((fd, sockaddr_storage_to_std(&storage))))
}

fn sockaddr_storage_to_std(storage: &libc::sockaddr_storage) -> SocketAddr {
    match storage.ss_family as libc::c_int {
        libc::AF_INET => {
            let sa: &libc::sockaddr_in = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(sa.sin_addr.s_addr.to_ne_bytes());
            SocketAddr::new(IpAddr::V4(ip), u16::from_be(sa.sin_port))
        }
        libc::AF_INET6 => {
            let sa: &libc::sockaddr_in6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sa.sin6_addr.s6_addr);
            SocketAddr::new(IpAddr::V6(ip), u16::from_be(sa.sin6_port))
        }
        _ => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
    }
}

/// Opens a non-blocking socket toward `addr` and issues `connect()`.
/// `Ok((fd, true))` is the expected `EINPROGRESS` case; `Ok((fd, false))`
/// means `connect()` returned success synchronously, which can't happen
/// to a socket made non-blocking beforehand — the caller is expected to
/// treat that as the programmer-error case spec'd for this path.
pub fn connect_nonblocking(addr: SocketAddr) -> Result<(RawFd, bool), i32> {
    unsafe {
        let (family, sa_ptr, sa_len): (libc::c_int, *const libc::sockaddr, u32) = match addr {
            SocketAddr::V4(a) => {
                let sa = sockaddr_in(*a.ip(), a.port());
                return finish_connect(libc::AF_INET, &sa as *const _ as *const libc::sockaddr, mem::size_of_val(&sa) as u32);
            }
            SocketAddr::V6(a) => {
                let sa = sockaddr_in6(*a.ip(), a.port());
                return finish_connect(libc::AF_INET6, &sa as *const _ as *const libc::sockaddr, mem::size_of_val(&sa) as u32);
            }
        };
        #[allow(unreachable_code)]
        finish_connect(family, sa_ptr, sa_len)
    }
}

unsafe fn finish_connect(family: libc::c_int, sa: *const libc::sockaddr, sa_len: u32) -> Result<(RawFd, bool), i32> {
    let fd = libc::socket(family, libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, 0);
    if fd < 0 {
        return Err(*libc::__errno_location());
    }
    let rc = libc::connect(fd, sa, sa_len);
    if rc == 0 {
        return Ok((fd, false));
    }
    let errno = *libc::__errno_location();
    if errno == libc::EINPROGRESS {
        return Ok((fd, true));
    }
    libc::close(fd);
    Err(errno)
}

/// Reads the pending `SO_ERROR` off a socket whose non-blocking
/// `connect()` just became writable — 0 means the connection succeeded.
pub fn take_connect_error(fd: RawFd) -> i32 {
    let mut errno: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut errno as *mut _ as *mut libc::c_void,
            &mut len,
        );
    }
    errno
}

/// `None` on `EAGAIN`/`EWOULDBLOCK` (no data ready, not an error);
/// `Some(Ok(0))` is EOF; `Some(Err(_))` is a terminal I/O error.
pub fn try_read(fd: RawFd, buf: &mut [u8]) -> Option<io::Result<usize>> {
    if buf.is_empty() {
        return Some(Ok(0));
    }
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if n >= 0 {
        return Some(Ok(n as usize));
    }
    let errno = unsafe { *libc::__errno_location() };
    if errno == libc::EAGAIN || errno == libc::EWOULDBLOCK {
        None
    } else {
        Some(Err(io::Error::from_raw_os_error(errno)))
    }
}

/// Uses `send(2)` with `MSG_NOSIGNAL` rather than `write(2)` so a peer
/// that has already reset the connection yields `EPIPE` through the
/// normal error path instead of raising `SIGPIPE` and killing the
/// process — the reactor is a single thread with no per-fd signal
/// handling, so the write path itself must suppress it.
pub fn try_write(fd: RawFd, buf: &[u8]) -> Option<io::Result<usize>> {
    if buf.is_empty() {
        return Some(Ok(0));
    }
    let n = unsafe { libc::send(fd, buf.as_ptr() as *const libc::c_void, buf.len(), libc::MSG_NOSIGNAL) };
    if n >= 0 {
        return Some(Ok(n as usize));
    }
    let errno = unsafe { *libc::__errno_location() };
    if errno == libc::EAGAIN || errno == libc::EWOULDBLOCK {
        None
    } else {
        Some(Err(io::Error::from_raw_os_error(errno)))
    }
}

pub fn shutdown_write(fd: RawFd) {
    unsafe {
        libc::shutdown(fd, libc::SHUT_WR);
    }
}

pub fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}
