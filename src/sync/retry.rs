//! Attempt budget and fixed delay between attempts

use std::time::Duration;

use super::error::SyncError;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, at least 1
    pub max_attempts: u32,

    /// Wait between a failed attempt and the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(0),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_secs: u64) -> Result<Self, SyncError> {
        if max_attempts < 1 {
            return Err(SyncError::Config(
                "maxRetries must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay: Duration::from_secs(delay_secs),
        })
    }

    /// Whether a failed `attempt` (1-based) is followed by another one
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Check if an attempt failure is worth another attempt
pub fn is_retryable(error: &SyncError) -> bool {
    match error {
        // Network and remote-side failures
        SyncError::Transport(_) => true,
        // A fresh session may get through
        SyncError::Authentication(_) => true,
        // Everything else is fatal
        SyncError::Config(_)
        | SyncError::LocalFile { .. }
        | SyncError::Transfer { .. }
        | SyncError::Cleanup(_) => false,
    }
}
