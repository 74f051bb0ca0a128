//! Half-duplex-aware duplex byte copier for the COPY state.
//!
//! Each direction (client->origin, origin->client) owns a buffer and a
//! pair of half-close flags. Interest for a side is recomputed from
//! buffer occupancy on every tick rather than tracked as a separate
//! state machine, mirroring the original's `copy_fds()` re-arming the
//! poll mask after every read/write instead of keeping redundant state.

use socks5_buffer::Buffer;

const COPY_BUF: usize = 0x4000;

pub struct Copy {
    pub c2o: Buffer,
    pub o2c: Buffer,
    client_read_closed: bool,
    client_write_closed: bool,
    origin_read_closed: bool,
    origin_write_closed: bool,
}

impl Copy {
    pub fn new() -> Self {
        Self {
            c2o: Buffer::new(COPY_BUF),
            o2c: Buffer::new(COPY_BUF),
            client_read_closed: false,
            client_write_closed: false,
            origin_read_closed: false,
            origin_write_closed: false,
        }
    }

    pub fn close_client_read(&mut self) {
        self.client_read_closed = true;
    }

    pub fn close_client_write(&mut self) {
        self.client_write_closed = true;
    }

    pub fn close_origin_read(&mut self) {
        self.origin_read_closed = true;
    }

    pub fn close_origin_write(&mut self) {
        self.origin_write_closed = true;
    }

    /// The client side reads into `c2o` (unless the client has EOFed or
    /// the origin side can no longer accept writes) and writes out of
    /// `o2c` whenever there is pending data.
    pub fn client_interest(&self) -> socks5_reactor::Interest {
        use socks5_reactor::selector::{NOOP, READ, WRITE};
        let mut interest = NOOP;
        if !self.client_read_closed && !self.origin_write_closed && self.c2o.can_write() {
            interest |= READ;
        }
        if !self.client_write_closed && self.o2c.can_read() {
            interest |= WRITE;
        }
        interest
    }

    pub fn origin_interest(&self) -> socks5_reactor::Interest {
        use socks5_reactor::selector::{NOOP, READ, WRITE};
        let mut interest = NOOP;
        if !self.origin_read_closed && !self.client_write_closed && self.o2c.can_write() {
            interest |= READ;
        }
        if !self.origin_write_closed && self.c2o.can_read() {
            interest |= WRITE;
        }
        interest
    }

    /// The origin has EOFed or errored: nothing more will ever reach the
    /// client, so its write side is shut down immediately, the same
    /// tick the origin's read closes. Any bytes still sitting in `o2c`
    /// are abandoned, not flushed first — `copy_r` clears the peer's
    /// `OP_WRITE` bit unconditionally in the same branch that handles
    /// `n <= 0`, with no check of the pending side first.
    pub fn client_write_should_close(&self) -> bool {
        !self.client_write_closed && self.origin_read_closed
    }

    pub fn origin_write_should_close(&self) -> bool {
        !self.origin_write_closed && self.client_read_closed
    }

    /// Both fds have had both their read and write halves closed.
    pub fn is_done(&self) -> bool {
        (self.client_read_closed && self.client_write_closed)
            && (self.origin_read_closed && self.origin_write_closed)
    }
}

impl Default for Copy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socks5_reactor::selector::{READ, WRITE};

    #[test]
    fn fresh_copy_wants_to_read_both_sides() {
        let c = Copy::new();
        assert_eq!(c.client_interest(), READ);
        assert_eq!(c.origin_interest(), READ);
    }

    #[test]
    fn pending_data_arms_the_opposite_write_side() {
        let mut c = Copy::new();
        c.c2o.write(b"hello");
        assert_eq!(c.origin_interest(), READ | WRITE);
    }

    #[test]
    fn client_eof_stops_reading_but_still_drains_o2c() {
        let mut c = Copy::new();
        c.o2c.write(b"reply");
        c.close_client_read();
        assert_eq!(c.client_interest(), WRITE);
    }

    #[test]
    fn done_once_both_directions_are_closed_and_drained() {
        let mut c = Copy::new();
        assert!(!c.is_done());
        c.close_client_read();
        c.close_origin_write();
        c.close_origin_read();
        c.close_client_write();
        assert!(c.is_done());
    }

    #[test]
    fn not_done_while_bytes_remain_undelivered() {
        let mut c = Copy::new();
        c.c2o.write(b"x");
        c.close_client_read();
        c.close_origin_read();
        c.close_client_write();
        assert!(!c.is_done());
    }
}
