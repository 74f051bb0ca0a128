//! Wires a [`socks5_monitor::session::MonitorSession`] to the reactor.
//!
//! Simpler than the SOCKS5 side: one fd, three states
//! (Reading/Writing/Done), no background work. The session still
//! never touches a socket itself — `recv_target`/`on_received` and
//! `send_source`/`on_sent` are the same shape `socks5_session::Session`
//! uses, just without a `Vec<Command>` return value since there's
//! nothing for a monitor connection to ask the caller to do beyond
//! "read more" or "write what's queued".

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use socks5_monitor::session::MonitorSession;
use socks5_reactor::selector::{Handler, Selector, Token, READ, WRITE};

use crate::net;
use crate::state::SharedState;

pub struct MonitorConn {
    pub session: MonitorSession,
    pub token: Token,
    pub pool_idx: usize,
}

pub struct MonitorHandler {
    pub conn: Rc<RefCell<MonitorConn>>,
    pub shared: Rc<RefCell<SharedState>>,
}

impl Handler for MonitorHandler {
    fn handle_read(&mut self, token: Token, fd: RawFd, sel: &mut Selector) {
        let outcome = {
            let mut c = self.conn.borrow_mut();
            net::try_read(fd, c.session.recv_target())
        };
        let n = match outcome {
            None => return,
            Some(Ok(0)) | Some(Err(_)) => {
                teardown(&self.conn, &self.shared, token, sel);
                return;
            }
            Some(Ok(n)) => n,
        };
        {
            let mut c = self.conn.borrow_mut();
            let mut shared = self.shared.borrow_mut();
            c.session.on_received(n, &mut shared.runtime);
        }
        if self.conn.borrow().session.has_pending_write() {
            let _ = sel.set_interest(token, WRITE);
        }
    }

    fn handle_write(&mut self, token: Token, fd: RawFd, sel: &mut Selector) {
        let outcome = {
            let c = self.conn.borrow();
            net::try_write(fd, c.session.send_source())
        };
        let n = match outcome {
            None | Some(Err(_)) => return,
            Some(Ok(n)) => n,
        };
        let done = {
            let mut c = self.conn.borrow_mut();
            c.session.on_sent(n);
            c.session.is_done()
        };
        if done {
            teardown(&self.conn, &self.shared, token, sel);
        }
    }

    fn handle_block(&mut self, _token: Token, _fd: RawFd, _sel: &mut Selector) {}

    fn handle_close(&mut self, _token: Token, fd: RawFd) {
        net::close_fd(fd);
    }
}

fn teardown(conn: &Rc<RefCell<MonitorConn>>, shared: &Rc<RefCell<SharedState>>, token: Token, sel: &mut Selector) {
    let pool_idx = conn.borrow().pool_idx;
    let _ = sel.unregister(token);
    shared.borrow_mut().monitor_pool.free(pool_idx);
}

pub fn accept_all(listener_fd: RawFd, shared: &Rc<RefCell<SharedState>>, sel: &mut Selector) {
    loop {
        match net::accept_one(listener_fd) {
            None => break,
            Some(Err(_)) => break,
            Some(Ok((fd, _addr))) => spawn_session(fd, shared, sel),
        }
    }
}

fn spawn_session(fd: RawFd, shared: &Rc<RefCell<SharedState>>, sel: &mut Selector) {
    let conn = Rc::new(RefCell::new(MonitorConn {
        session: MonitorSession::new(),
        token: Token(0),
        pool_idx: 0,
    }));
    let pool_idx = match shared.borrow_mut().monitor_pool.alloc(Rc::clone(&conn)) {
        Some(idx) => idx,
        None => {
            net::close_fd(fd);
            return;
        }
    };
    let handler = Box::new(MonitorHandler { conn: Rc::clone(&conn), shared: Rc::clone(shared) });
    let token = match sel.register(fd, READ, handler) {
        Ok(token) => token,
        Err(_) => {
            shared.borrow_mut().monitor_pool.free(pool_idx);
            net::close_fd(fd);
            return;
        }
    };
    let mut c = conn.borrow_mut();
    c.token = token;
    c.pool_idx = pool_idx;
}
