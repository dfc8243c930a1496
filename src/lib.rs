//! OxideSync - resumable SFTP sync backend for backup artifacts
//!
//! Pushes a finished backup file to a remote server, resuming partial
//! uploads across attempts, and hands off to a retention policy once the
//! file is safely on the remote side.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! use oxide_sync::config::SftpSyncConfig;
//! use oxide_sync::sync::{CleanupInvoker, Target, TracingSink};
//!
//! # async fn run(options: BTreeMap<String, String>) -> Result<(), oxide_sync::sync::SyncError> {
//! let setup = SftpSyncConfig::from_options(&options)?
//!     .setup(Path::new("/etc/backup"), &chrono::Local::now())?;
//! let mut engine = setup.into_engine(CleanupInvoker::disabled());
//!
//! let target = Target::new("/var/backups", "db-nightly.tar", 3, 10)?.with_compression("zst");
//! let outcome = engine.sync(&target, &TracingSink).await?;
//! engine.shutdown().await?;
//! println!("uploaded {} in {} attempt(s)", outcome.remote_file, outcome.attempts);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ssh;
pub mod sync;
pub mod transport;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Honors `RUST_LOG`, defaulting to `info`. Embedding tools that already
/// install a subscriber should not call this.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
