use std::fmt;

#[derive(Debug)]
pub enum SessionError {
    Proto(socks5_proto::ProtoError),
    Io(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proto(e) => write!(f, "protocol error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<socks5_proto::ProtoError> for SessionError {
    fn from(e: socks5_proto::ProtoError) -> Self {
        Self::Proto(e)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
