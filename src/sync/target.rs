//! Local backup artifact descriptor

use std::path::{Path, PathBuf};

use super::error::SyncError;
use super::retry::RetryPolicy;

/// Artifact produced upstream that a sync run pushes to the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    directory: PathBuf,
    filename: String,
    compression: Option<String>,
    retry: RetryPolicy,
}

impl Target {
    pub fn new(
        directory: impl Into<PathBuf>,
        filename: impl Into<String>,
        max_retries: u32,
        retry_delay_secs: u64,
    ) -> Result<Self, SyncError> {
        let directory = directory.into();
        let filename = filename.into();

        if directory.as_os_str().is_empty() {
            return Err(SyncError::Config("target directory must not be empty".into()));
        }
        if filename.is_empty() {
            return Err(SyncError::Config("target filename must not be empty".into()));
        }

        Ok(Self {
            directory,
            filename,
            compression: None,
            retry: RetryPolicy::new(max_retries, retry_delay_secs)?,
        })
    }

    /// Tag appended as file extension, e.g. `gz` or `zst`
    pub fn with_compression(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.compression = (!tag.is_empty()).then_some(tag);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn compression(&self) -> Option<&str> {
        self.compression.as_deref()
    }

    /// Artifact file name including the compression suffix
    pub fn filename(&self) -> String {
        match &self.compression {
            Some(tag) => format!("{}.{}", self.filename, tag),
            None => self.filename.clone(),
        }
    }

    /// Full local path of the artifact
    pub fn pathname(&self) -> PathBuf {
        self.directory.join(self.filename())
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_parts() {
        assert!(matches!(
            Target::new("", "db.tar", 3, 0),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            Target::new("/var/backups", "", 3, 0),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            Target::new("/var/backups", "db.tar", 0, 0),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_pathname_with_compression() {
        let target = Target::new("/var/backups", "db-20240101.tar", 3, 10)
            .unwrap()
            .with_compression("gz");
        assert_eq!(target.filename(), "db-20240101.tar.gz");
        assert_eq!(
            target.pathname(),
            PathBuf::from("/var/backups/db-20240101.tar.gz")
        );
        assert_eq!(target.retry().max_attempts, 3);
    }

    #[test]
    fn test_empty_compression_tag_is_ignored() {
        let target = Target::new("/var/backups", "db.tar", 1, 0)
            .unwrap()
            .with_compression("");
        assert_eq!(target.compression(), None);
        assert_eq!(target.filename(), "db.tar");
    }
}
