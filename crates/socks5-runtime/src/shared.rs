//! Aggregates the pieces of state every session handler needs a
//! `&mut` to: the user and admin tables, the three process counters,
//! and the process-wide POP3 disector toggle. One instance lives for
//! the life of the process and is threaded through both the SOCKS5 and
//! monitor session handlers by the binary's main loop.

use crate::admins::AdminTable;
use crate::counters::Counters;
use crate::users::UserTable;

pub struct SharedRuntime {
    pub users: UserTable,
    pub admins: AdminTable,
    pub counters: Counters,
    pub pop3_disector_enabled: bool,
}

impl SharedRuntime {
    pub fn new(root_admin_token: [u8; 16]) -> Self {
        Self {
            users: UserTable::new(),
            admins: AdminTable::with_root(root_admin_token),
            counters: Counters::new(),
            pop3_disector_enabled: false,
        }
    }
}
