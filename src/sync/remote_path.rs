//! Remote target path resolution
//!
//! A relative path is anchored to the session's working directory the first
//! time it is resolved. The result is cached for the rest of the run, so a
//! later change of working directory (directory traversal, reconnect) never
//! produces a different absolute path.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use tracing::debug;

use super::error::SyncError;
use crate::config::expand_time_placeholders;
use crate::transport::path_utils::{
    is_absolute_remote_path, join_remote_path, remote_segments, segments_to_path,
};
use crate::transport::{TransportError, TransportSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    raw: String,
    absolute: Option<String>,
}

impl RemotePath {
    /// Path without placeholders
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            absolute: None,
        }
    }

    /// Expand time placeholders once, from `now`
    pub fn from_template<Tz>(template: &str, now: &DateTime<Tz>) -> Result<Self, SyncError>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Ok(Self::new(expand_time_placeholders(template, now)?))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Absolute form, once resolved
    pub fn absolute(&self) -> Option<&str> {
        self.absolute.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.absolute.is_some()
    }

    /// Resolve to an absolute path, querying the session at most once.
    pub async fn resolve<S>(&mut self, session: &mut S) -> Result<&str, TransportError>
    where
        S: TransportSession + ?Sized,
    {
        if self.absolute.is_none() {
            let joined = if is_absolute_remote_path(&self.raw) {
                self.raw.clone()
            } else {
                let cwd = session.current_directory().await?;
                join_remote_path(&cwd, &self.raw)
            };
            let absolute = segments_to_path(&remote_segments(&joined));
            debug!("Resolved remote path '{}' to {}", self.raw, absolute);
            self.absolute = Some(absolute);
        }

        Ok(self.absolute.as_deref().unwrap_or("/"))
    }

    /// Directory segments, root to leaf; empty until resolved
    pub fn segments(&self) -> Vec<String> {
        self.absolute
            .as_deref()
            .map(remote_segments)
            .unwrap_or_default()
    }

    /// Absolute remote path of `filename` inside the resolved directory
    pub fn file_path(&self, filename: &str) -> Option<String> {
        self.absolute
            .as_deref()
            .map(|dir| join_remote_path(dir, filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryConnector, MemoryState};
    use crate::transport::Connector;
    use chrono::Utc;

    #[tokio::test]
    async fn test_relative_path_anchored_to_login_directory() {
        let state = MemoryState::new("/backup");
        let mut session = MemoryConnector { state: state.clone() }
            .connect()
            .await
            .unwrap();

        let mut path = RemotePath::new("foo");
        assert_eq!(path.resolve(&mut session).await.unwrap(), "/backup/foo");
        assert_eq!(path.segments(), vec!["backup", "foo"]);
        assert_eq!(path.file_path("db.tar").unwrap(), "/backup/foo/db.tar");
    }

    #[tokio::test]
    async fn test_resolution_is_cached() {
        let state = MemoryState::new("/backup");
        state.lock().add_dir("/elsewhere");
        let mut session = MemoryConnector { state: state.clone() }
            .connect()
            .await
            .unwrap();

        let mut path = RemotePath::new("foo");
        path.resolve(&mut session).await.unwrap();
        session.change_directory("/elsewhere").await.unwrap();

        assert_eq!(path.resolve(&mut session).await.unwrap(), "/backup/foo");
        assert_eq!(state.lock().calls_matching("pwd").len(), 1);
    }

    #[tokio::test]
    async fn test_absolute_path_skips_directory_query() {
        let state = MemoryState::new("/home/backup");
        let mut session = MemoryConnector { state: state.clone() }
            .connect()
            .await
            .unwrap();

        let mut path = RemotePath::new("/srv//backups/./db/");
        assert_eq!(path.resolve(&mut session).await.unwrap(), "/srv/backups/db");
        assert!(state.lock().calls_matching("pwd").is_empty());
    }

    #[tokio::test]
    async fn test_empty_path_is_login_directory() {
        let state = MemoryState::new("/home/backup");
        let mut session = MemoryConnector { state }.connect().await.unwrap();

        let mut path = RemotePath::new("");
        assert_eq!(path.resolve(&mut session).await.unwrap(), "/home/backup");
    }

    #[test]
    fn test_template_expanded_at_construction() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        let path = RemotePath::from_template("nightly/%Y-%m-%d", &now).unwrap();
        assert_eq!(path.raw(), "nightly/2024-12-31");
        assert!(!path.is_resolved());
        assert!(path.segments().is_empty());
    }
}
