//! # socks5-runtime — state shared by every connection
//!
//! Everything here is owned by the single reactor thread and touched
//! with plain `&mut` — no locks, because nothing outside that thread
//! ever reaches in directly (the DNS-offload thread only talks back
//! through the reactor's notify channel, never through this state).

pub mod admins;
pub mod counters;
pub mod logsink;
pub mod pool;
pub mod shared;
pub mod users;

pub use admins::AdminTable;
pub use counters::Counters;
pub use logsink::LogSink;
pub use pool::Pool;
pub use shared::SharedRuntime;
pub use users::UserTable;
