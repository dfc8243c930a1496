//! SFTP transport over russh
//!
//! SFTP has no server-side working directory, so the session tracks one
//! client-side and resolves relative paths against it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use russh::Disconnect;
use russh_sftp::client::error::Error as SftpErrorInner;
use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::error::TransportError;
use super::path_utils::{is_absolute_remote_path, join_remote_path};
use super::{Connector, RemoteWriter, TransportSession};
use crate::ssh::{Credentials, Endpoint, HostKeyPolicy, SshClient, SshError, SshHandle};

/// SFTP I/O timeout to prevent zombie transfers on SSH disconnect (5 minutes)
const SFTP_IO_TIMEOUT: Duration = Duration::from_secs(300);

type LastError = Arc<Mutex<Option<String>>>;

/// Opens authenticated SFTP sessions for one endpoint
pub struct SftpConnector {
    client: SshClient,
}

impl SftpConnector {
    pub fn new(endpoint: Endpoint, credentials: Credentials, host_keys: HostKeyPolicy) -> Self {
        Self {
            client: SshClient::new(endpoint, credentials, host_keys),
        }
    }
}

#[async_trait]
impl Connector for SftpConnector {
    type Session = SftpTransport;

    async fn connect(&self) -> Result<SftpTransport, TransportError> {
        let handle = self.client.connect().await?;
        SftpTransport::open(handle).await
    }
}

/// SFTP session bound to its SSH connection
pub struct SftpTransport {
    handle: SshHandle,
    sftp: RusshSftpSession,
    cwd: String,
    last_error: LastError,
}

impl SftpTransport {
    /// Open the SFTP subsystem on an authenticated connection
    pub async fn open(handle: SshHandle) -> Result<Self, TransportError> {
        info!("Opening SFTP subsystem");

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::ChannelError(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            SshError::ChannelError(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        // Login directory
        let cwd = sftp
            .canonicalize(".")
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        debug!("SFTP subsystem opened, initial directory {}", cwd);

        Ok(Self {
            handle,
            sftp,
            cwd,
            last_error: Arc::new(Mutex::new(None)),
        })
    }

    fn absolute(&self, path: &str) -> String {
        if is_absolute_remote_path(path) {
            path.to_string()
        } else {
            join_remote_path(&self.cwd, path)
        }
    }

    fn record<T>(&self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        record(&self.last_error, result)
    }
}

fn record<T>(slot: &LastError, result: Result<T, TransportError>) -> Result<T, TransportError> {
    if let Err(e) = &result {
        *slot.lock() = Some(e.to_string());
    }
    result
}

/// Markers russh-sftp uses when the underlying channel is gone
const DEAD_CHANNEL_MARKERS: &[&str] = &[
    "closed",
    "Timeout",
    "sender dropped",
    "RecvError",
    "I/O:",
    "No connection",
    "Connection lost",
];

/// Map SFTP errors to our error type
fn map_sftp_error(err: SftpErrorInner, path: &str) -> TransportError {
    classify_sftp_message(err.to_string(), path)
}

fn classify_sftp_message(err_str: String, path: &str) -> TransportError {
    if err_str.contains("No such file") || err_str.contains("not found") {
        TransportError::NotFound(path.to_string())
    } else if err_str.contains("Permission denied") {
        TransportError::PermissionDenied(path.to_string())
    } else if DEAD_CHANNEL_MARKERS.iter().any(|m| err_str.contains(m)) {
        TransportError::Disconnected(err_str)
    } else {
        TransportError::Protocol(err_str)
    }
}

#[async_trait]
impl TransportSession for SftpTransport {
    type Writer = SftpWriter;

    async fn current_directory(&mut self) -> Result<String, TransportError> {
        Ok(self.cwd.clone())
    }

    async fn is_directory(&mut self, path: &str) -> Result<bool, TransportError> {
        let path = self.absolute(path);
        let result = match self.sftp.metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) => match map_sftp_error(e, &path) {
                TransportError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        };
        self.record(result)
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let path = self.absolute(path);
        info!("Creating directory: {}", path);
        let result = self
            .sftp
            .create_dir(&path)
            .await
            .map_err(|e| map_sftp_error(e, &path));
        self.record(result)
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let path = self.absolute(path);
        if !self.is_directory(&path).await? {
            return self.record(Err(TransportError::NotFound(path)));
        }
        debug!("Changed directory to {}", path);
        self.cwd = path;
        Ok(())
    }

    async fn file_size(&mut self, path: &str) -> Result<Option<u64>, TransportError> {
        let path = self.absolute(path);
        let result = match self.sftp.metadata(&path).await {
            Ok(metadata) => Ok(Some(metadata.size.unwrap_or(0))),
            Err(e) => match map_sftp_error(e, &path) {
                TransportError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        };
        self.record(result)
    }

    async fn open_writer(
        &mut self,
        path: &str,
        offset: u64,
    ) -> Result<SftpWriter, TransportError> {
        let path = self.absolute(path);
        let opened = self
            .sftp
            .open_with_flags(&path, OpenFlags::CREATE | OpenFlags::WRITE)
            .await
            .map_err(|e| map_sftp_error(e, &path));
        let mut file = self.record(opened)?;

        if offset > 0 {
            let seeked = file
                .seek(std::io::SeekFrom::Start(offset))
                .await
                .map(|_| ())
                .map_err(|e| TransportError::Protocol(e.to_string()));
            self.record(seeked)?;
            debug!("Seeked remote file {} to offset {}", path, offset);
        }

        Ok(SftpWriter {
            file,
            path,
            last_error: self.last_error.clone(),
        })
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Err(e) = self.sftp.close().await {
            warn!("Failed to close SFTP session cleanly: {}", e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(SshError::from)?;
        info!("SFTP session closed");
        Ok(())
    }
}

/// Writer into a remote file opened by [`SftpTransport::open_writer`]
pub struct SftpWriter {
    file: File,
    path: String,
    last_error: LastError,
}

#[async_trait]
impl RemoteWriter for SftpWriter {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let result = match tokio::time::timeout(SFTP_IO_TIMEOUT, self.file.write_all(data)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(format!("{}: {}", self.path, e))),
            Err(_) => {
                warn!("SFTP write timeout after {:?} on {}", SFTP_IO_TIMEOUT, self.path);
                Err(TransportError::Timeout(format!(
                    "Remote write timeout after {:?} - SSH connection may be dead",
                    SFTP_IO_TIMEOUT
                )))
            }
        };
        record(&self.last_error, result)
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        let result = match tokio::time::timeout(SFTP_IO_TIMEOUT, self.file.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(format!("{}: {}", self.path, e))),
            Err(_) => Err(TransportError::Timeout(format!(
                "Remote flush timeout after {:?} - SSH connection may be dead",
                SFTP_IO_TIMEOUT
            ))),
        };
        record(&self.last_error, result)
    }
}
