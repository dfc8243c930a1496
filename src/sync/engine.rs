//! Resumable upload with a bounded attempt loop
//!
//! Every attempt replays the whole chain: session, path resolution,
//! directory creation, resume offset, upload. The resume offset is always
//! read back from the remote file, never carried over in memory, so an
//! attempt cut short by a process kill or a network drop resumes where the
//! remote side actually stopped.

use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use super::cleanup::{CleanupInvoker, ReportSink};
use super::directories::DirectoryEnsurer;
use super::error::SyncError;
use super::remote_path::RemotePath;
use super::retry::is_retryable;
use super::target::Target;
use crate::transport::path_utils::join_remote_path;
use crate::transport::{Connector, RemoteWriter, TransportError, TransportSession};

/// Local read / remote write unit
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Result of a successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Attempt that succeeded, 1-based
    pub attempts: u32,
    /// Bytes written during the successful attempt
    pub bytes_sent: u64,
    /// The remote file was already complete; nothing was uploaded
    pub already_present: bool,
    /// Absolute remote path of the uploaded file
    pub remote_file: String,
}

/// Bookkeeping for the attempt in progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptState {
    /// 1-based attempt index
    pub attempt: u32,
    /// Byte position the upload continues from
    pub offset: u64,
    /// Diagnostic of the most recent failed attempt
    pub last_error: Option<String>,
}

impl AttemptState {
    fn begin(&mut self, attempt: u32) {
        self.attempt = attempt;
        self.offset = 0;
    }
}

struct AttemptResult {
    bytes_sent: u64,
    already_present: bool,
    remote_file: String,
}

/// Pushes one target to the remote side through a [`Connector`].
///
/// The session is built on first use and reused by later attempts; it is
/// only rebuilt after a failure that lost the connection, or after
/// [`TransferEngine::invalidate`].
pub struct TransferEngine<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    remote_path: RemotePath,
    cleanup: CleanupInvoker,
}

impl<C: Connector> TransferEngine<C> {
    pub fn new(connector: C, remote_path: RemotePath, cleanup: CleanupInvoker) -> Self {
        Self {
            connector,
            session: None,
            remote_path,
            cleanup,
        }
    }

    pub fn remote_path(&self) -> &RemotePath {
        &self.remote_path
    }

    pub fn cleanup(&self) -> &CleanupInvoker {
        &self.cleanup
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Push `target`, retrying per its policy, then run cleanup.
    pub async fn sync(
        &mut self,
        target: &Target,
        sink: &dyn ReportSink,
    ) -> Result<SyncOutcome, SyncError> {
        let policy = target.retry();
        let local_path = target.pathname();
        let local_size = tokio::fs::metadata(&local_path)
            .await
            .map_err(|source| local_error(&local_path, source))?
            .len();

        info!(
            "Syncing {} ({} bytes), up to {} attempts",
            local_path.display(),
            local_size,
            policy.max_attempts
        );

        let mut state = AttemptState::default();

        for attempt in 1..=policy.max_attempts {
            state.begin(attempt);
            info!("Transfer attempt {}/{}", attempt, policy.max_attempts);

            match self
                .run_attempt(target, &local_path, local_size, sink, &mut state)
                .await
            {
                Ok(result) => {
                    if result.already_present {
                        sink.debug(&format!(
                            "{} already complete on remote, skipping upload",
                            result.remote_file
                        ));
                    }
                    info!(
                        "Transfer of {} complete after {} attempt(s): {} bytes sent",
                        result.remote_file, attempt, result.bytes_sent
                    );

                    self.cleanup.run(target, sink).await?;

                    return Ok(SyncOutcome {
                        attempts: attempt,
                        bytes_sent: result.bytes_sent,
                        already_present: result.already_present,
                        remote_file: result.remote_file,
                    });
                }
                Err(e) if !is_retryable(&e) => {
                    warn!("Transfer failed with non-retryable error: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    let recorded = self.session.as_ref().and_then(|s| s.last_error());
                    let diagnostic = describe_failure(&e, recorded);
                    warn!(
                        "Attempt {}/{} failed at offset {}: {}",
                        attempt, policy.max_attempts, state.offset, diagnostic
                    );
                    sink.debug(&format!("attempt {} failed: {}", attempt, diagnostic));
                    state.last_error = Some(diagnostic);

                    if matches!(&e, SyncError::Transport(t) if t.is_connection_lost()) {
                        debug!("Connection lost, dropping cached session");
                        self.session = None;
                    }

                    if policy.has_next(attempt) && !policy.delay.is_zero() {
                        info!("Retrying in {:?}", policy.delay);
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        Err(SyncError::Transfer {
            attempts: policy.max_attempts,
            last_error: state
                .last_error
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    async fn run_attempt(
        &mut self,
        target: &Target,
        local_path: &Path,
        local_size: u64,
        sink: &dyn ReportSink,
        state: &mut AttemptState,
    ) -> Result<AttemptResult, SyncError> {
        let session = connect_once(&self.connector, &mut self.session).await?;

        let directory = self.remote_path.resolve(session).await?.to_string();
        DirectoryEnsurer::ensure(session, &directory).await?;

        let remote_file = join_remote_path(&directory, &target.filename());
        let remote_size = session.file_size(&remote_file).await?;
        state.offset = remote_size.unwrap_or(0);

        if remote_size.is_some() && state.offset >= local_size {
            return Ok(AttemptResult {
                bytes_sent: 0,
                already_present: true,
                remote_file,
            });
        }

        if state.offset > 0 {
            info!(
                "Resuming upload of {} from offset {}",
                remote_file, state.offset
            );
        }

        let start = state.offset;
        upload_from(session, local_path, &remote_file, local_size, sink, state).await?;

        Ok(AttemptResult {
            bytes_sent: state.offset - start,
            already_present: false,
            remote_file,
        })
    }

    /// Drop the cached session; the next sync authenticates again
    pub fn invalidate(&mut self) {
        self.session = None;
    }

    /// Close the cached session, if any
    pub async fn shutdown(&mut self) -> Result<(), SyncError> {
        if let Some(mut session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}

async fn connect_once<'a, C: Connector>(
    connector: &C,
    slot: &'a mut Option<C::Session>,
) -> Result<&'a mut C::Session, SyncError> {
    if slot.is_none() {
        let session = connector
            .connect()
            .await
            .map_err(SyncError::from_transport)?;
        *slot = Some(session);
    }
    slot.as_mut().ok_or_else(|| {
        SyncError::Transport(TransportError::Disconnected(
            "session unavailable".to_string(),
        ))
    })
}

/// Copy `local_path[state.offset..local_size]` to the remote file, advancing
/// `state.offset` after every chunk the remote side accepted.
async fn upload_from<S>(
    session: &mut S,
    local_path: &Path,
    remote_file: &str,
    local_size: u64,
    sink: &dyn ReportSink,
    state: &mut AttemptState,
) -> Result<(), SyncError>
where
    S: TransportSession + ?Sized,
{
    let mut local = tokio::fs::File::open(local_path)
        .await
        .map_err(|source| local_error(local_path, source))?;
    local
        .seek(SeekFrom::Start(state.offset))
        .await
        .map_err(|source| local_error(local_path, source))?;
    let mut local = local.take(local_size - state.offset);

    let mut writer = session.open_writer(remote_file, state.offset).await?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut reported = percent(state.offset, local_size);

    loop {
        let bytes_read = local
            .read(&mut buffer)
            .await
            .map_err(|source| local_error(local_path, source))?;
        if bytes_read == 0 {
            break;
        }

        writer.write_chunk(&buffer[..bytes_read]).await?;
        state.offset += bytes_read as u64;

        let pct = percent(state.offset, local_size);
        if pct != reported {
            reported = pct;
            sink.debug(&format!(
                "uploaded {}/{} bytes ({}%)",
                state.offset, local_size, pct
            ));
        }
    }

    writer.finish().await?;

    sink.debug(&format!(
        "upload of {} finished: {}/{} bytes (100%)",
        remote_file, state.offset, local_size
    ));
    Ok(())
}

/// Prefer the session's own record of a transport failure, unless it
/// describes an earlier failure.
fn describe_failure(err: &SyncError, recorded: Option<String>) -> String {
    match (err, recorded) {
        (SyncError::Transport(t), Some(recorded)) if recorded.contains(&t.to_string()) => recorded,
        (SyncError::Transport(t), _) => t.to_string(),
        _ => err.to_string(),
    }
}

fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        100
    } else {
        (done as u128 * 100 / total as u128) as u64
    }
}

fn local_error(path: &Path, source: std::io::Error) -> SyncError {
    SyncError::LocalFile {
        path: path.display().to_string(),
        source,
    }
}
