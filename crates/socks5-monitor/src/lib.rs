//! # socks5-monitor — the out-of-band admin/monitoring protocol
//!
//! Unlike the SOCKS5 session, this protocol's connections are simple
//! enough that they don't need the generic state-machine runtime: a
//! monitor connection only ever reads one request, processes it, writes
//! one response, and closes. [`session::MonitorSession`] models that
//! directly as three explicit steps rather than table-driven states.

pub mod proto;
pub mod session;

pub use proto::{GetTarget, MonitorRequest, Status};
pub use session::MonitorSession;
