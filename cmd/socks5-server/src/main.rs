//! Concurrent SOCKS5 proxy with an out-of-band admin/monitoring
//! protocol, driven by a single-threaded `poll(2)` reactor.
//!
//! Usage:
//!     socks5-server -l 0.0.0.0 -p 1080 -L 127.0.0.1 -P 8080 \
//!         -u alice:hunter2 --admin-token 00112233445566778899aabbccddeeff
//!
//! A v6 listener with `IPV6_V6ONLY` is always added alongside the v4
//! SOCKS5 listener, on the same port, so both address families are
//! reachable without a second `-p`.

mod args;
mod monitor_handler;
mod net;
mod socks_handler;
mod state;

use std::cell::RefCell;
use std::net::Ipv6Addr;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use socks5_reactor::selector::{Handler, Selector, Token, READ};

use state::SharedState;

const LISTEN_BACKLOG: i32 = 128;
const POLL_TIMEOUT_MS: i32 = 1000;

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_shutdown_signal(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

struct SocksAcceptor {
    shared: Rc<RefCell<SharedState>>,
}

impl Handler for SocksAcceptor {
    fn handle_read(&mut self, _token: Token, fd: RawFd, sel: &mut Selector) {
        socks_handler::accept_all(fd, &self.shared, sel);
    }
    fn handle_write(&mut self, _token: Token, _fd: RawFd, _sel: &mut Selector) {}
    fn handle_block(&mut self, _token: Token, _fd: RawFd, _sel: &mut Selector) {}
    fn handle_close(&mut self, _token: Token, fd: RawFd) {
        net::close_fd(fd);
    }
}

struct MonitorAcceptor {
    shared: Rc<RefCell<SharedState>>,
}

impl Handler for MonitorAcceptor {
    fn handle_read(&mut self, _token: Token, fd: RawFd, sel: &mut Selector) {
        monitor_handler::accept_all(fd, &self.shared, sel);
    }
    fn handle_write(&mut self, _token: Token, _fd: RawFd, _sel: &mut Selector) {}
    fn handle_block(&mut self, _token: Token, _fd: RawFd, _sel: &mut Selector) {}
    fn handle_close(&mut self, _token: Token, fd: RawFd) {
        net::close_fd(fd);
    }
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = args::parse(&argv);

    let opts = match parsed {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("socks5-server: {e}");
            eprintln!("{}", args::USAGE);
            std::process::exit(1);
        }
    };

    if opts.help {
        println!("{}", args::USAGE);
        std::process::exit(0);
    }
    if opts.version {
        println!("socks5-server {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    let mut sel = match Selector::new() {
        Ok(sel) => sel,
        Err(e) => {
            eprintln!("socks5-server: reactor setup failed: {e}");
            std::process::exit(2);
        }
    };

    let shared = Rc::new(RefCell::new(SharedState::new(opts.admin_token)));
    {
        let mut s = shared.borrow_mut();
        s.runtime.pop3_disector_enabled = opts.disectors_enabled;
        for (user, pass) in &opts.users {
            if let Err(e) = s.runtime.users.register(user, pass) {
                eprintln!("socks5-server: -u {user}: {e:?}");
                std::process::exit(1);
            }
        }
    }

    let socks_v4_addr = match opts.socks_addr {
        std::net::IpAddr::V4(a) => a,
        std::net::IpAddr::V6(_) => std::net::Ipv4Addr::UNSPECIFIED,
    };
    let socks_v4 = match net::listen_v4(socks_v4_addr, opts.socks_port, LISTEN_BACKLOG) {
        Ok(fd) => fd,
        Err(e) => {
            eprintln!("socks5-server: bind {socks_v4_addr}:{}: {e}", opts.socks_port);
            std::process::exit(1);
        }
    };
    let socks_v6 = match net::listen_v6(Ipv6Addr::UNSPECIFIED, opts.socks_port, LISTEN_BACKLOG) {
        Ok(fd) => fd,
        Err(e) => {
            eprintln!("socks5-server: bind [::]:{}: {e}", opts.socks_port);
            net::close_fd(socks_v4);
            std::process::exit(1);
        }
    };
    let monitor_fd = match opts.monitor_addr {
        std::net::IpAddr::V4(a) => net::listen_v4(a, opts.monitor_port, LISTEN_BACKLOG),
        std::net::IpAddr::V6(a) => net::listen_v6(a, opts.monitor_port, LISTEN_BACKLOG),
    };
    let monitor_fd = match monitor_fd {
        Ok(fd) => fd,
        Err(e) => {
            eprintln!("socks5-server: bind monitor {}:{}: {e}", opts.monitor_addr, opts.monitor_port);
            net::close_fd(socks_v4);
            net::close_fd(socks_v6);
            std::process::exit(1);
        }
    };

    if let Err(e) = sel.register(socks_v4, READ, Box::new(SocksAcceptor { shared: Rc::clone(&shared) })) {
        eprintln!("socks5-server: register SOCKS v4 listener: {e}");
        std::process::exit(2);
    }
    if let Err(e) = sel.register(socks_v6, READ, Box::new(SocksAcceptor { shared: Rc::clone(&shared) })) {
        eprintln!("socks5-server: register SOCKS v6 listener: {e}");
        std::process::exit(2);
    }
    if let Err(e) = sel.register(monitor_fd, READ, Box::new(MonitorAcceptor { shared: Rc::clone(&shared) })) {
        eprintln!("socks5-server: register monitor listener: {e}");
        std::process::exit(2);
    }

    unsafe {
        libc::signal(libc::SIGINT, handle_shutdown_signal as usize);
        libc::signal(libc::SIGTERM, handle_shutdown_signal as usize);
    }

    eprintln!(
        "socks5-server: SOCKS5 on {socks_v4_addr}:{0} (+ [::]:{0}), monitor on {1}:{2}",
        opts.socks_port, opts.monitor_addr, opts.monitor_port
    );

    while RUNNING.load(Ordering::Relaxed) {
        if let Err(e) = sel.tick(POLL_TIMEOUT_MS) {
            eprintln!("socks5-server: reactor error: {e}");
            std::process::exit(2);
        }
    }

    eprintln!("socks5-server: shutting down");
    drop(sel);
    std::process::exit(0);
}
