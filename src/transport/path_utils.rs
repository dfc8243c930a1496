//! Remote path helpers
//!
//! Remote SFTP paths always use `/` as separator (per SFTP protocol).
//! Even Windows SSH servers present paths in Unix style.

/// Check if a remote SFTP path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Join remote SFTP path components using `/` separator.
pub fn join_remote_path(base: &str, component: &str) -> String {
    let component = component.trim_start_matches('/');
    if component.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Directory segments of an absolute path, root to leaf.
///
/// Empty and `.` segments are dropped, `..` removes its parent.
pub fn remote_segments(path: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }
    segments
}

/// Absolute path for a list of segments
pub fn segments_to_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute_remote_path() {
        assert!(is_absolute_remote_path("/home/user"));
        assert!(is_absolute_remote_path("/"));
        assert!(!is_absolute_remote_path("relative/path"));
        assert!(!is_absolute_remote_path("C:\\Windows"));
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/", "home"), "/home");
        assert_eq!(join_remote_path("/backup", ""), "/backup");
    }

    #[test]
    fn test_remote_segments() {
        assert_eq!(remote_segments("/backup/foo"), vec!["backup", "foo"]);
        assert_eq!(remote_segments("//backup/./foo/"), vec!["backup", "foo"]);
        assert_eq!(remote_segments("/backup/tmp/../foo"), vec!["backup", "foo"]);
        assert!(remote_segments("/").is_empty());
    }

    #[test]
    fn test_segments_to_path() {
        let segments = remote_segments("/srv/backups/db");
        assert_eq!(segments_to_path(&segments), "/srv/backups/db");
        assert_eq!(segments_to_path(&[]), "/");
    }
}
