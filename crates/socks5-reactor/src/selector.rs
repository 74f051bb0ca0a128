//! `poll(2)`-driven readiness reactor.
//!
//! One fd, one [`Handler`], one interest mask. The loop is level
//! triggered: as long as an fd's registered interest overlaps its
//! readiness, its handler is invoked again on the next [`Selector::tick`].
//! Interest recomputation is the caller's job (e.g. the duplex copy
//! state recomputes its mask from buffer occupancy every tick) — the
//! reactor itself never infers interest from past events.

use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};

use crate::error::{ReactorError, Result};

pub type Interest = u8;

pub const NOOP: Interest = 0;
pub const READ: Interest = 1 << 0;
pub const WRITE: Interest = 1 << 1;
pub const BLOCK: Interest = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub usize);

/// Per-fd callback set. Implementors own all per-connection state and
/// reach back into the [`Selector`] (to change their own interest or to
/// register/unregister other fds) through the `sel` argument.
pub trait Handler {
    fn handle_read(&mut self, token: Token, fd: RawFd, sel: &mut Selector);
    fn handle_write(&mut self, token: Token, fd: RawFd, sel: &mut Selector);
    /// Fired once a [`NotifyHandle::notify_block`] targeting this token
    /// has been drained from the cross-thread queue.
    fn handle_block(&mut self, token: Token, fd: RawFd, sel: &mut Selector);
    /// Fired on `unregister`, always, even if the fd was never readable.
    fn handle_close(&mut self, token: Token, fd: RawFd);
}

struct Slot {
    fd: RawFd,
    interest: Interest,
    handler: Box<dyn Handler>,
}

/// Handle cloneable across threads so a background worker (DNS
/// resolution today) can wake the reactor without touching its fd
/// table directly.
#[derive(Clone)]
pub struct NotifyHandle {
    write_fd: RawFd,
    queue: Arc<Mutex<VecDeque<Token>>>,
}

// Safety: `write_fd` is only ever written to via `libc::write`, which is
// thread-safe for this usage (small atomic writes to a pipe), and the
// queue is behind a Mutex.
unsafe impl Send for NotifyHandle {}
unsafe impl Sync for NotifyHandle {}

impl NotifyHandle {
    pub fn notify_block(&self, token: Token) {
        self.queue.lock().unwrap().push_back(token);
        let byte = 1u8;
        unsafe {
            libc::write(self.write_fd, &byte as *const u8 as *const _, 1);
        }
    }
}

pub struct Selector {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    notify_read_fd: RawFd,
    notify_write_fd: RawFd,
    notify_queue: Arc<Mutex<VecDeque<Token>>>,
    /// The slot index currently being dispatched, if any. A handler's
    /// own slot is pulled out of `slots` for the duration of its
    /// callback (so `self` can be passed back in as `&mut Selector`
    /// without aliasing it) — `set_interest`/`unregister` called against
    /// that same index during the callback can't touch `slots[idx]`
    /// directly, so they stash the request here instead and `dispatch`
    /// applies it once the callback returns.
    current_token: Option<usize>,
    pending_self_interest: Option<Interest>,
    pending_self_unregister: bool,
}

impl Selector {
    pub fn new() -> Result<Self> {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if rc != 0 {
            return Err(ReactorError::PipeSetup(unsafe { *libc::__errno_location() }));
        }
        Ok(Self {
            slots: Vec::new(),
            free: Vec::new(),
            notify_read_fd: fds[0],
            notify_write_fd: fds[1],
            notify_queue: Arc::new(Mutex::new(VecDeque::new())),
            current_token: None,
            pending_self_interest: None,
            pending_self_unregister: false,
        })
    }

    pub fn notify_handle(&self) -> NotifyHandle {
        NotifyHandle {
            write_fd: self.notify_write_fd,
            queue: Arc::clone(&self.notify_queue),
        }
    }

    /// Ceiling on concurrently registered fds. Well above the session
    /// pools' own caps (client + origin + monitor), so in practice a
    /// pool's own limit is hit first; this is the backstop for whatever
    /// isn't pool-bounded (the listener fds themselves, notify plumbing).
    pub const MAX_SLOTS: usize = 65536;

    pub fn register(&mut self, fd: RawFd, interest: Interest, handler: Box<dyn Handler>) -> Result<Token> {
        if self.slots.iter().flatten().any(|s| s.fd == fd) {
            return Err(ReactorError::FdAlreadyRegistered(fd));
        }
        let slot = Slot { fd, interest, handler };
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            return Ok(Token(idx));
        }
        if self.slots.len() >= Self::MAX_SLOTS {
            return Err(ReactorError::CapacityExhausted);
        }
        self.slots.push(Some(slot));
        Ok(Token(self.slots.len() - 1))
    }

    /// A handler is free to retarget its own interest mid-callback (the
    /// COPY state recomputes both sides' masks after every read/write);
    /// when `token` is the slot currently being dispatched, the new
    /// mask is queued and applied when the slot is restored.
    pub fn set_interest(&mut self, token: Token, interest: Interest) -> Result<()> {
        if let Some(slot) = self.slots.get_mut(token.0).and_then(|s| s.as_mut()) {
            slot.interest = interest;
            return Ok(());
        }
        if self.current_token == Some(token.0) {
            self.pending_self_interest = Some(interest);
            return Ok(());
        }
        Err(ReactorError::UnknownToken)
    }

    /// Same self-targeting caveat as `set_interest`: a handler tearing
    /// itself down from within its own callback (the common case — a
    /// client EOF discovered in `handle_read` tears down that very fd)
    /// can't remove `slots[token.0]` right away, since it's absent for
    /// the callback's duration. It's marked for removal instead and the
    /// dispatch loop closes it once the callback returns.
    pub fn unregister(&mut self, token: Token) -> Result<()> {
        if let Some(slot) = self.slots.get_mut(token.0).and_then(Option::take) {
            self.free.push(token.0);
            let Slot { fd, mut handler, .. } = slot;
            handler.handle_close(token, fd);
            return Ok(());
        }
        if self.current_token == Some(token.0) {
            self.pending_self_unregister = true;
            return Ok(());
        }
        Err(ReactorError::UnknownToken)
    }

    pub fn fd_of(&self, token: Token) -> Option<RawFd> {
        self.slots.get(token.0).and_then(|s| s.as_ref()).map(|s| s.fd)
    }

    /// Runs one `poll()` round. `timeout_ms < 0` blocks indefinitely.
    /// Returns the number of handler callbacks fired.
    pub fn tick(&mut self, timeout_ms: i32) -> Result<usize> {
        let mut pollfds: Vec<libc::pollfd> = Vec::with_capacity(self.slots.len() + 1);
        pollfds.push(libc::pollfd {
            fd: self.notify_read_fd,
            events: libc::POLLIN,
            revents: 0,
        });

        let mut order: Vec<usize> = Vec::with_capacity(self.slots.len());
        for (idx, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                if slot.interest == NOOP {
                    continue;
                }
                let mut events = 0;
                if slot.interest & READ != 0 {
                    events |= libc::POLLIN;
                }
                if slot.interest & WRITE != 0 {
                    events |= libc::POLLOUT;
                }
                pollfds.push(libc::pollfd { fd: slot.fd, events, revents: 0 });
                order.push(idx);
            }
        }

        let rc = unsafe {
            libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms)
        };
        if rc < 0 {
            let errno = unsafe { *libc::__errno_location() };
            if errno == libc::EINTR {
                return Ok(0);
            }
            return Err(ReactorError::PollFailed(errno));
        }

        let mut fired = 0usize;

        if pollfds[0].revents & libc::POLLIN != 0 {
            self.drain_notify_pipe();
            fired += self.dispatch_block_queue();
        }

        for (slot_pos, &idx) in order.iter().enumerate() {
            let revents = pollfds[slot_pos + 1].revents;
            if revents == 0 {
                continue;
            }
            let readable = revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0;
            let writable = revents & libc::POLLOUT != 0;

            if readable {
                fired += self.dispatch_read(Token(idx));
            }
            if writable {
                fired += self.dispatch_write(Token(idx));
            }
        }

        Ok(fired)
    }

    fn drain_notify_pipe(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(self.notify_read_fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }

    fn dispatch_block_queue(&mut self) -> usize {
        let pending: Vec<Token> = {
            let mut q = self.notify_queue.lock().unwrap();
            q.drain(..).collect()
        };
        let mut fired = 0;
        for token in pending {
            let slot = match self.slots.get_mut(token.0).and_then(Option::take) {
                Some(slot) => slot,
                None => continue,
            };
            let Slot { fd, mut handler, interest } = slot;
            let prev_token = self.current_token.replace(token.0);
            self.pending_self_interest = None;
            self.pending_self_unregister = false;
            handler.handle_block(token, fd, self);
            self.current_token = prev_token;
            if self.pending_self_unregister {
                self.free.push(token.0);
                handler.handle_close(token, fd);
            } else if let Some(slot_ref) = self.slots.get_mut(token.0) {
                if slot_ref.is_none() {
                    let interest = self.pending_self_interest.take().unwrap_or(interest);
                    *slot_ref = Some(Slot { fd, interest, handler });
                }
            }
            fired += 1;
        }
        fired
    }

    fn dispatch_read(&mut self, token: Token) -> usize {
        self.dispatch(token, |h, t, fd, sel| h.handle_read(t, fd, sel))
    }

    fn dispatch_write(&mut self, token: Token) -> usize {
        self.dispatch(token, |h, t, fd, sel| h.handle_write(t, fd, sel))
    }

    fn dispatch(
        &mut self,
        token: Token,
        f: impl FnOnce(&mut dyn Handler, Token, RawFd, &mut Selector),
    ) -> usize {
        let slot = match self.slots.get_mut(token.0).and_then(Option::take) {
            Some(slot) => slot,
            None => return 0,
        };
        let Slot { fd, mut handler, interest } = slot;
        let prev_token = self.current_token.replace(token.0);
        self.pending_self_interest = None;
        self.pending_self_unregister = false;
        f(&mut *handler, token, fd, self);
        self.current_token = prev_token;
        if self.pending_self_unregister {
            self.free.push(token.0);
            handler.handle_close(token, fd);
        } else if let Some(slot_ref) = self.slots.get_mut(token.0) {
            if slot_ref.is_none() {
                let interest = self.pending_self_interest.take().unwrap_or(interest);
                *slot_ref = Some(Slot { fd, interest, handler });
            }
        }
        1
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.notify_read_fd);
            libc::close(self.notify_write_fd);
        }
    }
}
