//! The cross-thread slot a background DNS lookup writes its result
//! into before waking the reactor through `notify_block`, mirroring
//! the original's `getaddrinfo()` + `selector_notify_block()` pair run
//! from a one-shot `pthread_create`d worker.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub type ResolveOutcome = io::Result<Vec<SocketAddr>>;

#[derive(Clone)]
pub struct ResolveSlot {
    inner: Arc<Mutex<Option<ResolveOutcome>>>,
}

impl ResolveSlot {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(None)) }
    }

    pub fn publish(&self, outcome: ResolveOutcome) {
        *self.inner.lock().unwrap() = Some(outcome);
    }

    pub fn take(&self) -> Option<ResolveOutcome> {
        self.inner.lock().unwrap().take()
    }
}

impl Default for ResolveSlot {
    fn default() -> Self {
        Self::new()
    }
}
