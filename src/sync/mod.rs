//! Sync backend: push a backup artifact, retry, hand off to cleanup
//!
//! ```text
//! TransferEngine ── Connector ──> TransportSession
//!      │             RemotePath (resolved once per run)
//!      │             DirectoryEnsurer (every attempt)
//!      └── CleanupInvoker (after success only)
//! ```

mod cleanup;
mod directories;
mod engine;
mod error;
mod remote_path;
mod retry;
mod target;

pub use cleanup::{Cleaner, CleanupInvoker, CleanupOptions, ReportSink, TracingSink};
pub use directories::DirectoryEnsurer;
pub use engine::{AttemptState, SyncOutcome, TransferEngine, CHUNK_SIZE};
pub use error::SyncError;
pub use remote_path::RemotePath;
pub use retry::{is_retryable, RetryPolicy};
pub use target::Target;
