//! Hand-off to the retention policy after a successful upload

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::SyncError;
use super::target::Target;

/// Write-only sink for progress and diagnostic messages
pub trait ReportSink: Send + Sync {
    fn debug(&self, message: &str);
}

/// Forwards report messages to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn debug(&self, message: &str) {
        debug!(target: "oxide_sync::report", "{}", message);
    }
}

/// Options handed to the retention collaborator, `cleanup.` prefix stripped
pub type CleanupOptions = BTreeMap<String, String>;

/// Retention policy collaborator: decides which old remote backups to drop.
#[async_trait]
pub trait Cleaner: Send + Sync {
    async fn cleanup(
        &self,
        target: &Target,
        options: &CleanupOptions,
        sink: &dyn ReportSink,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Calls the configured [`Cleaner`], if any. Holds no retention logic.
#[derive(Clone, Default)]
pub struct CleanupInvoker {
    cleaner: Option<Arc<dyn Cleaner>>,
    options: CleanupOptions,
}

impl CleanupInvoker {
    pub fn new(cleaner: Arc<dyn Cleaner>) -> Self {
        Self {
            cleaner: Some(cleaner),
            options: CleanupOptions::new(),
        }
    }

    /// No retention policy configured
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Replace the options forwarded to the cleaner
    pub fn with_options(mut self, options: CleanupOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CleanupOptions {
        &self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.cleaner.is_some()
    }

    /// Run the cleaner. Only called once the transfer has succeeded.
    pub async fn run(&self, target: &Target, sink: &dyn ReportSink) -> Result<(), SyncError> {
        let Some(cleaner) = &self.cleaner else {
            debug!("No cleanup configured for {}", target.filename());
            return Ok(());
        };

        info!("Running remote cleanup for {}", target.filename());
        cleaner
            .cleanup(target, &self.options, sink)
            .await
            .map_err(|e| SyncError::Cleanup(e.to_string()))
    }
}
