//! Reactor error types.

use std::fmt;
use std::os::unix::io::RawFd;

#[derive(Debug)]
pub enum ReactorError {
    /// `pipe2()` for the cross-thread notify channel failed.
    PipeSetup(i32),
    /// `poll()` itself returned an error (not a per-fd one).
    PollFailed(i32),
    /// Operation referenced a token that was never registered, or was
    /// already unregistered.
    UnknownToken,
    /// `register` was called with an fd already occupying another slot.
    FdAlreadyRegistered(RawFd),
    /// `register` was called with every slot in use.
    CapacityExhausted,
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PipeSetup(e) => write!(f, "notify pipe setup failed: errno {}", e),
            Self::PollFailed(e) => write!(f, "poll() failed: errno {}", e),
            Self::UnknownToken => write!(f, "unknown or stale token"),
            Self::FdAlreadyRegistered(fd) => write!(f, "fd {} is already registered", fd),
            Self::CapacityExhausted => write!(f, "reactor slot capacity exhausted"),
        }
    }
}

impl std::error::Error for ReactorError {}

pub type Result<T> = std::result::Result<T, ReactorError>;
