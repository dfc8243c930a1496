//! Transport error types

use thiserror::Error;

use crate::ssh::SshError;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No such file: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ssh(#[from] SshError),
}

impl TransportError {
    /// Login or key rejected while building the session
    pub fn is_authentication(&self) -> bool {
        matches!(self, TransportError::Ssh(e) if e.is_authentication())
    }

    /// The session can no longer be used and must be rebuilt.
    ///
    /// A failed write counts: the channel state after a broken write is unknown.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            TransportError::Timeout(_)
            | TransportError::Disconnected(_)
            | TransportError::Io(_)
            | TransportError::Write(_) => true,
            TransportError::Ssh(e) => !e.is_authentication(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let auth = TransportError::from(SshError::AuthenticationFailed("rejected".into()));
        assert!(auth.is_authentication());
        assert!(!auth.is_connection_lost());

        let dropped = TransportError::from(SshError::ConnectionFailed("reset".into()));
        assert!(!dropped.is_authentication());
        assert!(dropped.is_connection_lost());

        assert!(TransportError::Timeout("write".into()).is_connection_lost());
        assert!(TransportError::Write("/backup/db.tar: broken pipe".into()).is_connection_lost());
        assert!(!TransportError::Protocol("bad handle".into()).is_connection_lost());
        assert!(!TransportError::PermissionDenied("/backup".into()).is_connection_lost());
    }
}
