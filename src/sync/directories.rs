//! Remote directory chain creation

use tracing::{debug, info};

use crate::transport::path_utils::{is_absolute_remote_path, remote_segments, segments_to_path};
use crate::transport::{TransportError, TransportSession};

/// Walks an absolute directory path root to leaf, creating what is missing.
///
/// Safe to repeat: existing directories are only entered. Afterwards the
/// session's working directory is the leaf.
pub struct DirectoryEnsurer;

impl DirectoryEnsurer {
    /// Returns the directories that had to be created.
    pub async fn ensure<S>(session: &mut S, absolute: &str) -> Result<Vec<String>, TransportError>
    where
        S: TransportSession + ?Sized,
    {
        if !is_absolute_remote_path(absolute) {
            return Err(TransportError::Protocol(format!(
                "refusing to create directories for relative path '{}'",
                absolute
            )));
        }

        let segments = remote_segments(absolute);
        if segments.is_empty() {
            session.change_directory("/").await?;
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for depth in 1..=segments.len() {
            let dir = segments_to_path(&segments[..depth]);

            if session.is_directory(&dir).await? {
                debug!("Remote directory exists: {}", dir);
            } else {
                session.make_directory(&dir).await?;
                created.push(dir.clone());
            }

            session.change_directory(&dir).await?;
        }

        if !created.is_empty() {
            info!("Created {} remote directories under {}", created.len(), absolute);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryConnector, MemoryState, MemorySession};
    use crate::transport::Connector;
    use parking_lot::Mutex;
    use std::sync::Arc;

    async fn session(home: &str) -> (Arc<Mutex<MemoryState>>, MemorySession) {
        let state = MemoryState::new(home);
        let session = MemoryConnector { state: state.clone() }
            .connect()
            .await
            .unwrap();
        (state, session)
    }

    #[tokio::test]
    async fn test_checks_creates_and_enters_in_order() {
        let (state, mut session) = session("/").await;

        let created = DirectoryEnsurer::ensure(&mut session, "/backup/foo").await.unwrap();
        assert_eq!(created, vec!["/backup", "/backup/foo"]);

        let state = state.lock();
        let walk: Vec<&str> = state
            .calls
            .iter()
            .filter(|c| !c.starts_with("connect"))
            .map(String::as_str)
            .collect();
        assert_eq!(
            walk,
            vec![
                "is_dir /backup",
                "mkdir /backup",
                "cd /backup",
                "is_dir /backup/foo",
                "mkdir /backup/foo",
                "cd /backup/foo",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_prefix_is_only_entered() {
        let (state, mut session) = session("/srv").await;
        state.lock().add_dir("/srv/backups");

        let created = DirectoryEnsurer::ensure(&mut session, "/srv/backups/db/2024")
            .await
            .unwrap();
        assert_eq!(created, vec!["/srv/backups/db", "/srv/backups/db/2024"]);
        assert_eq!(
            session.current_directory().await.unwrap(),
            "/srv/backups/db/2024"
        );
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let (state, mut session) = session("/").await;

        DirectoryEnsurer::ensure(&mut session, "/backup/foo").await.unwrap();
        let first_cwd = session.current_directory().await.unwrap();

        let created = DirectoryEnsurer::ensure(&mut session, "/backup/foo").await.unwrap();
        assert!(created.is_empty());
        assert_eq!(session.current_directory().await.unwrap(), first_cwd);
        assert_eq!(state.lock().calls_matching("mkdir").len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_relative_path() {
        let (_state, mut session) = session("/").await;
        assert!(matches!(
            DirectoryEnsurer::ensure(&mut session, "backup/foo").await,
            Err(TransportError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_root_only_enters_root() {
        let (_state, mut session) = session("/home/backup").await;
        let created = DirectoryEnsurer::ensure(&mut session, "/").await.unwrap();
        assert!(created.is_empty());
        assert_eq!(session.current_directory().await.unwrap(), "/");
    }
}
