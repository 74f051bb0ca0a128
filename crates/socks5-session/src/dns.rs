//! Background DNS resolution, one throwaway thread per lookup.
//!
//! Mirrors `request_resolv_blocking()` in the original: a session that
//! needs a domain name resolved spawns a detached worker, the worker
//! blocks on the resolver, and on completion it publishes the result
//! into a [`ResolveSlot`] and pokes the reactor's self-pipe so the
//! session's block handler gets a chance to pick it up. Nothing here
//! touches the session directly — the thread only ever sees the slot
//! and the notify handle.

use std::net::{SocketAddr, ToSocketAddrs};
use std::thread;

use socks5_reactor::selector::{NotifyHandle, Token};

use crate::resolve::ResolveSlot;

/// Spawn a lookup for `host:port`. The calling session is responsible
/// for having registered `token` with the reactor beforehand so the
/// eventual `notify_block(token)` has somewhere to land.
pub fn spawn_lookup(host: String, port: u16, slot: ResolveSlot, notify: NotifyHandle, token: Token) {
    thread::spawn(move || {
        let outcome = resolve_blocking(&host, port);
        slot.publish(outcome);
        notify.notify_block(token);
    });
}

fn resolve_blocking(host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
    (host, port).to_socket_addrs().map(|it| it.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use socks5_reactor::Selector;
    use std::time::Duration;

    #[test]
    fn lookup_of_a_literal_resolves_without_real_dns() {
        let mut sel = Selector::new().unwrap();
        let notify = sel.notify_handle();
        let slot = ResolveSlot::new();
        spawn_lookup("127.0.0.1".to_string(), 9999, slot.clone(), notify, Token(0));

        let mut got = None;
        for _ in 0..50 {
            if let Some(outcome) = slot.take() {
                got = Some(outcome);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let addrs = got.expect("lookup should have completed").unwrap();
        assert_eq!(addrs[0].port(), 9999);
    }
}
