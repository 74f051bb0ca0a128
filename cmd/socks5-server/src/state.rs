//! Process-wide state threaded through every `Handler` callback: the
//! shared runtime tables the sessions mutate, plus the two fixed-size
//! session pools that bound how many concurrent SOCKS5 and monitor
//! connections the process will hold open at once.

use std::cell::RefCell;
use std::rc::Rc;

use socks5_runtime::logsink::StdoutSink;
use socks5_runtime::{Pool, SharedRuntime};

use crate::monitor_handler::MonitorConn;
use crate::socks_handler::SocksConn;

pub const SOCKS_POOL_CAP: usize = 50;
pub const MONITOR_POOL_CAP: usize = 5;

pub struct SharedState {
    pub runtime: SharedRuntime,
    pub socks_pool: Pool<Rc<RefCell<SocksConn>>>,
    pub monitor_pool: Pool<Rc<RefCell<MonitorConn>>>,
    pub log: StdoutSink,
}

impl SharedState {
    pub fn new(root_admin_token: [u8; 16]) -> Self {
        Self {
            runtime: SharedRuntime::new(root_admin_token),
            socks_pool: Pool::new(SOCKS_POOL_CAP),
            monitor_pool: Pool::new(MONITOR_POOL_CAP),
            log: StdoutSink,
        }
    }
}
