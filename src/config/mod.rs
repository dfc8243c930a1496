//! SFTP sync backend configuration
//!
//! Accepted either as JSON / any serde format, or as the flat key/value
//! options a backup orchestrator hands to its sync backends. Keys under
//! `cleanup.` are collected untouched for the retention collaborator.

mod template;

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use template::expand_time_placeholders;

use crate::ssh::{default_port, default_timeout, Credentials, Endpoint, HostKeyPolicy};
use crate::sync::{CleanupInvoker, CleanupOptions, RemotePath, SyncError, TransferEngine};
use crate::transport::SftpConnector;

const CLEANUP_PREFIX: &str = "cleanup.";

/// Raw backend configuration, before validation
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SftpSyncConfig {
    /// Remote host address
    #[serde(default)]
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user
    #[serde(default)]
    pub user: String,

    /// Login password, or passphrase of `key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Private key file, relative paths resolve against the working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,

    /// Remote directory, relative to the login directory unless absolute.
    /// May contain time placeholders (`%Y`, `%m`, ...).
    #[serde(default)]
    pub path: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Reject hosts missing from known_hosts
    #[serde(default)]
    pub strict_host_key_checking: bool,

    /// known_hosts file, `~/.ssh/known_hosts` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<PathBuf>,

    /// Options for the retention collaborator, never interpreted here
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cleanup: BTreeMap<String, String>,
}

impl fmt::Debug for SftpSyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpSyncConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key)
            .field("path", &self.path)
            .field("timeout_secs", &self.timeout_secs)
            .field("strict_host_key_checking", &self.strict_host_key_checking)
            .field("known_hosts", &self.known_hosts)
            .field("cleanup", &self.cleanup)
            .finish()
    }
}

impl Default for SftpSyncConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: None,
            key: None,
            path: String::new(),
            timeout_secs: default_timeout(),
            strict_host_key_checking: false,
            known_hosts: None,
            cleanup: BTreeMap::new(),
        }
    }
}

/// Validated setup for one sync run
#[derive(Debug, Clone)]
pub struct SyncSetup {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub host_keys: HostKeyPolicy,
    pub remote_path: RemotePath,
    pub cleanup: CleanupOptions,
}

impl SyncSetup {
    pub fn connector(&self) -> SftpConnector {
        SftpConnector::new(
            self.endpoint.clone(),
            self.credentials.clone(),
            self.host_keys.clone(),
        )
    }

    /// Engine over SFTP for this setup; the `cleanup.*` options travel
    /// with `cleanup` to its cleaner.
    pub fn into_engine(self, cleanup: CleanupInvoker) -> TransferEngine<SftpConnector> {
        let connector = self.connector();
        TransferEngine::new(
            connector,
            self.remote_path,
            cleanup.with_options(self.cleanup),
        )
    }
}

impl SftpSyncConfig {
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("invalid sftp sync config: {}", e)))
    }

    /// Read the flat option form (`host`, `port`, `cleanup.type`, ...)
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, SyncError> {
        let mut config = Self::default();

        for (name, value) in options {
            if let Some(cleanup_key) = name.strip_prefix(CLEANUP_PREFIX) {
                config
                    .cleanup
                    .insert(cleanup_key.to_string(), value.clone());
                continue;
            }

            match name.as_str() {
                "host" => config.host = value.clone(),
                "port" => {
                    config.port = value.parse().map_err(|_| {
                        SyncError::Config(format!("invalid port '{}'", value))
                    })?
                }
                "user" => config.user = value.clone(),
                "password" => config.password = Some(value.clone()),
                "key" => config.key = Some(PathBuf::from(value)),
                "path" => config.path = value.clone(),
                "timeout" => {
                    config.timeout_secs = value.parse().map_err(|_| {
                        SyncError::Config(format!("invalid timeout '{}'", value))
                    })?
                }
                "strictHostKeyChecking" => config.strict_host_key_checking = parse_bool(value)?,
                "knownHosts" => config.known_hosts = Some(PathBuf::from(value)),
                other => debug!("Ignoring unknown sftp option '{}'", other),
            }
        }

        Ok(config)
    }

    /// Validate and resolve everything that can be checked locally.
    ///
    /// `now` is the single timestamp used for every placeholder in `path`.
    pub fn setup<Tz>(self, working_dir: &Path, now: &DateTime<Tz>) -> Result<SyncSetup, SyncError>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if self.host.trim().is_empty() {
            return Err(SyncError::Config("option 'host' is missing".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(SyncError::Config("option 'user' is missing".to_string()));
        }

        let password = self.password.filter(|p| !p.is_empty());
        let key = match self.key.filter(|k| !k.as_os_str().is_empty()) {
            Some(key) => Some(resolve_key_path(&key, working_dir)?),
            None => None,
        };

        let credentials = Credentials::from_parts(password, key).ok_or_else(|| {
            SyncError::Config("either option 'password' or 'key' is required".to_string())
        })?;

        let remote_path = RemotePath::from_template(&self.path, now)?;

        debug!(
            "SFTP sync setup: {}@{}:{} ({}), path '{}'",
            self.user,
            self.host,
            self.port,
            credentials.method(),
            remote_path.raw()
        );

        Ok(SyncSetup {
            endpoint: Endpoint::new(self.host, self.port, self.user).with_timeout(self.timeout_secs),
            credentials,
            host_keys: HostKeyPolicy {
                strict: self.strict_host_key_checking,
                known_hosts: self.known_hosts,
            },
            remote_path,
            cleanup: self.cleanup,
        })
    }
}

fn resolve_key_path(key: &Path, working_dir: &Path) -> Result<PathBuf, SyncError> {
    let absolute = if key.is_absolute() {
        key.to_path_buf()
    } else {
        working_dir.join(key)
    };

    if !absolute.is_file() {
        return Err(SyncError::Config(format!(
            "private key file not found: {}",
            absolute.display()
        )));
    }
    Ok(absolute)
}

fn parse_bool(value: &str) -> Result<bool, SyncError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(SyncError::Config(format!("invalid boolean '{}'", other))),
    }
}
