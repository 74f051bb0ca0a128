//! Wires a [`socks5_session::Session`] to the reactor.
//!
//! A session spans two fds (client, origin) once it reaches
//! `REQUEST_CONNECTING`, but both fds drive the *same* `Session`. Since
//! `Selector::register` takes one boxed `Handler` per fd and both
//! handlers need to mutate the same state with no locks (single
//! reactor thread, per the original's single-threaded design), the
//! `Session` lives behind an `Rc<RefCell<_>>` shared between a
//! client-role and an origin-role `SocksHandler`. Neither handler ever
//! touches a socket directly except through `crate::net` — `Session`
//! itself stays pure, returning `Command`s that this file is the only
//! thing that executes.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use socks5_reactor::selector::{Handler, Selector, Token};
use socks5_session::{states, Command, Session};

use crate::net;
use crate::state::SharedState;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Client,
    Origin,
}

pub struct SocksConn {
    pub session: Session,
    pub client_token: Token,
    pub origin_token: Option<Token>,
    pub pool_idx: usize,
}

pub struct SocksHandler {
    pub conn: Rc<RefCell<SocksConn>>,
    pub shared: Rc<RefCell<SharedState>>,
    pub role: Role,
}

impl Handler for SocksHandler {
    fn handle_read(&mut self, _token: Token, fd: RawFd, sel: &mut Selector) {
        let n = match self.role {
            Role::Client => {
                let outcome = {
                    let mut c = self.conn.borrow_mut();
                    net::try_read(fd, c.session.client_recv_target())
                };
                match outcome {
                    None => return,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => 0,
                }
            }
            Role::Origin => {
                let outcome = {
                    let mut c = self.conn.borrow_mut();
                    net::try_read(fd, c.session.origin_recv_target())
                };
                match outcome {
                    None => return,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => 0,
                }
            }
        };
        let cmds = {
            let mut c = self.conn.borrow_mut();
            let mut shared = self.shared.borrow_mut();
            match self.role {
                Role::Client => c.session.on_client_read(n, &mut shared.runtime),
                Role::Origin => c.session.on_origin_read(n, &mut shared.runtime),
            }
        };
        apply_commands(cmds, &self.conn, &self.shared, sel);
    }

    fn handle_write(&mut self, _token: Token, fd: RawFd, sel: &mut Selector) {
        if self.role == Role::Origin {
            let connecting = self.conn.borrow().session.state() == states::REQUEST_CONNECTING;
            if connecting {
                let errno = net::take_connect_error(fd);
                let cmds = {
                    let mut c = self.conn.borrow_mut();
                    let mut shared = self.shared.borrow_mut();
                    c.session.on_origin_connect_result(errno, &mut shared.runtime)
                };
                apply_commands(cmds, &self.conn, &self.shared, sel);
                return;
            }
        }
        let outcome = {
            let c = self.conn.borrow();
            let src = match self.role {
                Role::Client => c.session.client_send_source(),
                Role::Origin => c.session.origin_send_source(),
            };
            net::try_write(fd, src)
        };
        // A write error surfaces as POLLERR/POLLHUP on the same fd too,
        // which the next readable dispatch treats as EOF and tears down
        // through the normal path — no separate error channel needed.
        let n = match outcome {
            None | Some(Err(_)) => return,
            Some(Ok(n)) => n,
        };
        let cmds = {
            let mut c = self.conn.borrow_mut();
            let mut shared = self.shared.borrow_mut();
            match self.role {
                Role::Client => c.session.on_client_sent(n, &mut shared.runtime),
                Role::Origin => c.session.on_origin_sent(n, &mut shared.runtime),
            }
        };
        apply_commands(cmds, &self.conn, &self.shared, sel);
    }

    fn handle_block(&mut self, _token: Token, _fd: RawFd, sel: &mut Selector) {
        if self.role != Role::Client {
            return;
        }
        let cmds = {
            let mut c = self.conn.borrow_mut();
            let mut shared = self.shared.borrow_mut();
            c.session.on_block_ready(&mut shared.runtime)
        };
        apply_commands(cmds, &self.conn, &self.shared, sel);
    }

    fn handle_close(&mut self, _token: Token, fd: RawFd) {
        net::close_fd(fd);
    }
}

/// Executes every `Command` a `Session` method handed back. Recurses
/// for `BeginConnect`, since opening the origin socket can itself
/// produce a `Command` (`RegisterOrigin`, or a DNS-fallback retry) that
/// needs applying in turn.
pub fn apply_commands(cmds: Vec<Command>, conn: &Rc<RefCell<SocksConn>>, shared: &Rc<RefCell<SharedState>>, sel: &mut Selector) {
    for cmd in cmds {
        match cmd {
            Command::BeginConnect { addr } => begin_connect(addr, conn, shared, sel),
            Command::RegisterOrigin { fd, interest } => {
                let handler = Box::new(SocksHandler { conn: Rc::clone(conn), shared: Rc::clone(shared), role: Role::Origin });
                match sel.register(fd, interest, handler) {
                    Ok(token) => conn.borrow_mut().origin_token = Some(token),
                    Err(_) => {
                        // Reactor has no room for the origin fd. Close it
                        // and drive the session through the same failure
                        // path a failed connect() would take, so the
                        // client still gets a SOCKS5 reply rather than
                        // hanging on a socket nothing will ever service.
                        net::close_fd(fd);
                        let cmds = {
                            let mut c = conn.borrow_mut();
                            let mut shared = shared.borrow_mut();
                            c.session.on_origin_connect_result(libc::ENOMEM, &mut shared.runtime)
                        };
                        apply_commands(cmds, conn, shared, sel);
                    }
                }
            }
            Command::SetClientInterest(interest) => {
                let token = conn.borrow().client_token;
                let _ = sel.set_interest(token, interest);
            }
            Command::SetOriginInterest(interest) => {
                if let Some(token) = conn.borrow().origin_token {
                    let _ = sel.set_interest(token, interest);
                }
            }
            Command::SpawnDnsLookup { host, port } => {
                let (slot, notify, token) = {
                    let c = conn.borrow();
                    (c.session.resolve_slot(), sel.notify_handle(), c.client_token)
                };
                socks5_session::dns::spawn_lookup(host, port, slot, notify, token);
            }
            Command::CloseOrigin => {
                let token = conn.borrow_mut().origin_token.take();
                if let Some(token) = token {
                    let _ = sel.unregister(token);
                }
            }
            Command::CloseSession => {
                let (client_token, origin_token, pool_idx) = {
                    let c = conn.borrow();
                    (c.client_token, c.origin_token, c.pool_idx)
                };
                if let Some(origin_token) = origin_token {
                    conn.borrow_mut().origin_token = None;
                    let _ = sel.unregister(origin_token);
                }
                let _ = sel.unregister(client_token);
                shared.borrow_mut().socks_pool.free(pool_idx);
            }
            Command::ShutdownClientWrite => {
                let token = conn.borrow().client_token;
                if let Some(fd) = sel.fd_of(token) {
                    net::shutdown_write(fd);
                }
            }
            Command::ShutdownOriginWrite => {
                if let Some(token) = conn.borrow().origin_token {
                    if let Some(fd) = sel.fd_of(token) {
                        net::shutdown_write(fd);
                    }
                }
            }
            Command::LogRequest { uname, client_addr, dest, status } => {
                let mut shared = shared.borrow_mut();
                socks5_runtime::logsink::log_request(&mut shared.log, uname.as_deref(), &client_addr, &dest, status);
            }
            Command::LogCredentials { uname, dest, user, pass } => {
                let mut shared = shared.borrow_mut();
                socks5_runtime::logsink::log_credentials(&mut shared.log, uname.as_deref(), &dest, &user, &pass);
            }
        }
    }
}

fn begin_connect(addr: SocketAddr, conn: &Rc<RefCell<SocksConn>>, shared: &Rc<RefCell<SharedState>>, sel: &mut Selector) {
    match net::connect_nonblocking(addr) {
        Ok((fd, true)) => {
            let cmds = conn.borrow_mut().session.on_connect_opened(fd, true);
            apply_commands(cmds, conn, shared, sel);
        }
        Ok((fd, false)) => {
            // Deliberately lets `Session::on_connect_opened` panic: a
            // synchronous connect success on a non-blocking socket
            // cannot happen and is treated as a programmer error.
            let _ = conn.borrow_mut().session.on_connect_opened(fd, false);
        }
        Err(errno) => {
            let cmds = {
                let mut c = conn.borrow_mut();
                let mut shared = shared.borrow_mut();
                c.session.on_origin_connect_result(errno, &mut shared.runtime)
            };
            apply_commands(cmds, conn, shared, sel);
        }
    }
}

/// Accepts every pending connection on `listener_fd` and spins up a
/// fresh `Session` for each. A full pool silently drops the accepted
/// fd rather than blocking the listener — matching the client-visible
/// behavior of a connection that was accepted and immediately reset.
pub fn accept_all(listener_fd: RawFd, shared: &Rc<RefCell<SharedState>>, sel: &mut Selector) {
    loop {
        match net::accept_one(listener_fd) {
            None => break,
            Some(Err(_)) => break,
            Some(Ok((fd, addr))) => spawn_session(fd, addr, shared, sel),
        }
    }
}

fn spawn_session(fd: RawFd, addr: SocketAddr, shared: &Rc<RefCell<SharedState>>, sel: &mut Selector) {
    let conn = Rc::new(RefCell::new(SocksConn {
        session: Session::new(fd, addr),
        client_token: Token(0),
        origin_token: None,
        pool_idx: 0,
    }));
    let pool_idx = match shared.borrow_mut().socks_pool.alloc(Rc::clone(&conn)) {
        Some(idx) => idx,
        None => {
            net::close_fd(fd);
            return;
        }
    };
    let handler = Box::new(SocksHandler { conn: Rc::clone(&conn), shared: Rc::clone(shared), role: Role::Client });
    let token = match sel.register(fd, socks5_reactor::selector::READ, handler) {
        Ok(token) => token,
        Err(_) => {
            shared.borrow_mut().socks_pool.free(pool_idx);
            net::close_fd(fd);
            return;
        }
    };
    let mut c = conn.borrow_mut();
    c.client_token = token;
    c.pool_idx = pool_idx;
}
