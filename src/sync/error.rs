//! Sync error types

use thiserror::Error;

use crate::ssh::SshError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid or incomplete setup, never retried
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login rejected; a later attempt may authenticate from scratch
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Failure inside a single attempt
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local artifact missing or unreadable
    #[error("Local file error: {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// All attempts used up
    #[error("Transfer failed after {attempts} attempts: {last_error}")]
    Transfer { attempts: u32, last_error: String },

    /// The cleanup collaborator failed after a successful upload
    #[error("Cleanup failed: {0}")]
    Cleanup(String),
}

impl SyncError {
    /// Map a per-attempt transport failure, splitting out rejected logins
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Ssh(SshError::AuthenticationFailed(msg)) => {
                SyncError::Authentication(msg)
            }
            TransportError::Ssh(SshError::KeyError(msg)) => {
                SyncError::Authentication(format!("unusable private key: {}", msg))
            }
            other => SyncError::Transport(other),
        }
    }
}
