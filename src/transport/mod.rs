//! Transport capability set
//!
//! The sync engine only talks to the remote side through these traits, so
//! any file-transfer protocol with directories, sizes and offset writes can
//! back it. [`SftpConnector`] is the russh-sftp implementation.

mod error;
#[cfg(test)]
pub(crate) mod memory;
pub mod path_utils;
mod sftp;

use async_trait::async_trait;

pub use error::TransportError;
pub use sftp::{SftpConnector, SftpTransport, SftpWriter};

/// Builds authenticated sessions for one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: TransportSession;

    /// Connect and authenticate. A rejected login surfaces as an error for
    /// which [`TransportError::is_authentication`] holds.
    async fn connect(&self) -> Result<Self::Session, TransportError>;
}

/// Authenticated handle to the remote endpoint.
#[async_trait]
pub trait TransportSession: Send {
    type Writer: RemoteWriter;

    /// Working directory the session is currently in
    async fn current_directory(&mut self) -> Result<String, TransportError>;

    async fn is_directory(&mut self, path: &str) -> Result<bool, TransportError>;

    async fn make_directory(&mut self, path: &str) -> Result<(), TransportError>;

    async fn change_directory(&mut self, path: &str) -> Result<(), TransportError>;

    /// Size of a remote file, `None` if it does not exist
    async fn file_size(&mut self, path: &str) -> Result<Option<u64>, TransportError>;

    /// Open `path` for writing, positioned at `offset`. Existing bytes before
    /// `offset` are kept.
    async fn open_writer(&mut self, path: &str, offset: u64)
        -> Result<Self::Writer, TransportError>;

    /// Last diagnostic reported by the remote side, if any
    fn last_error(&self) -> Option<String>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Sequential writer into one remote file.
#[async_trait]
pub trait RemoteWriter: Send {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Flush outstanding data; the writer is not used afterwards
    async fn finish(&mut self) -> Result<(), TransportError>;
}
