//! SSH Configuration

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

/// Remote endpoint a sync backend connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Remote host address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            timeout_secs: default_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// `host:port`, used for connecting and in log lines
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication material
///
/// Secrets are wiped on drop and never shown by `Debug`.
#[derive(Clone)]
pub enum Credentials {
    /// Password authentication
    Password { password: Zeroizing<String> },

    /// SSH key authentication
    Key {
        /// Absolute path to private key file
        key_path: PathBuf,
        /// Optional passphrase for encrypted keys
        passphrase: Option<Zeroizing<String>>,
    },
}

impl Credentials {
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password {
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn key(key_path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self::Key {
            key_path: key_path.into(),
            passphrase: passphrase.map(Zeroizing::new),
        }
    }

    /// Pick the auth method: a configured key wins and the password, if any,
    /// becomes its passphrase. Returns `None` when neither is present.
    pub fn from_parts(password: Option<String>, key_path: Option<PathBuf>) -> Option<Self> {
        match (key_path, password) {
            (Some(key_path), passphrase) => Some(Self::key(key_path, passphrase)),
            (None, Some(password)) => Some(Self::password(password)),
            (None, None) => None,
        }
    }

    /// Short method name for logs
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::Password { .. } => "password",
            Credentials::Key { .. } => "publickey",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Key {
                key_path,
                passphrase,
            } => f
                .debug_struct("Key")
                .field("key_path", key_path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// How unknown and changed server keys are treated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyPolicy {
    /// Strict host key checking
    /// - true: reject connections to unknown hosts
    /// - false: accept and record unknown hosts, still reject changed keys
    pub strict: bool,

    /// known_hosts file, `~/.ssh/known_hosts` when unset
    pub known_hosts: Option<PathBuf>,
}

impl HostKeyPolicy {
    pub fn known_hosts_path(&self) -> PathBuf {
        self.known_hosts.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".ssh").join("known_hosts"))
                .unwrap_or_else(|| PathBuf::from("~/.ssh/known_hosts"))
        })
    }
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            known_hosts: None,
        }
    }
}

pub(crate) fn default_port() -> u16 {
    22
}

pub(crate) fn default_timeout() -> u64 {
    30
}
