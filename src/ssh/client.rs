//! SSH Client implementation using russh

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use tracing::{debug, info, warn};

use super::config::{Credentials, Endpoint, HostKeyPolicy};
use super::error::SshError;
use super::known_hosts::{HostKeyVerification, KnownHostsStore};

/// Authenticated SSH connection handle
pub type SshHandle = client::Handle<ClientHandler>;

/// Connects and authenticates against one backup endpoint
pub struct SshClient {
    endpoint: Endpoint,
    credentials: Credentials,
    host_keys: HostKeyPolicy,
}

impl SshClient {
    pub fn new(endpoint: Endpoint, credentials: Credentials, host_keys: HostKeyPolicy) -> Self {
        Self {
            endpoint,
            credentials,
            host_keys,
        }
    }

    /// Connect to the SSH server and authenticate
    pub async fn connect(&self) -> Result<SshHandle, SshError> {
        let addr = self.endpoint.addr();
        info!("Connecting to SSH server at {}", addr);

        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(
            self.endpoint.host.clone(),
            self.endpoint.port,
            self.host_keys.clone(),
        );

        let mut handle = tokio::time::timeout(
            Duration::from_secs(self.endpoint.timeout_secs),
            client::connect(Arc::new(ssh_config), addr.as_str(), handler),
        )
        .await
        .map_err(|_| SshError::Timeout(format!("Connection to {} timed out", addr)))??;

        debug!("SSH handshake completed");

        self.authenticate(&mut handle).await?;

        info!(
            "SSH authentication successful for {}@{} ({})",
            self.endpoint.username,
            addr,
            self.credentials.method()
        );
        Ok(handle)
    }

    /// Key material wins over a bare password; the password then unlocks the key.
    async fn authenticate(&self, handle: &mut SshHandle) -> Result<(), SshError> {
        let username = &self.endpoint.username;

        let result = match &self.credentials {
            Credentials::Password { password } => handle
                .authenticate_password(username, password.as_str())
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?,
            Credentials::Key {
                key_path,
                passphrase,
            } => {
                let key = russh::keys::load_secret_key(
                    key_path,
                    passphrase.as_ref().map(|p| p.as_str()),
                )
                .map_err(|e| {
                    SshError::KeyError(format!("Failed to load {}: {}", key_path.display(), e))
                })?;

                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);

                handle
                    .authenticate_publickey(username, key_with_hash)
                    .await
                    .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
            }
        };

        if !result.success() {
            return Err(SshError::AuthenticationFailed(format!(
                "{} login for user '{}' rejected by server",
                self.credentials.method(),
                username
            )));
        }

        Ok(())
    }
}

/// Client handler for russh callbacks; verifies the server host key
pub struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let known_hosts = KnownHostsStore::with_path(self.policy.known_hosts_path());

        match known_hosts.verify(&self.host, self.port, server_public_key) {
            HostKeyVerification::Verified => {
                debug!("Host key verified for {}:{}", self.host, self.port);
                Ok(true)
            }
            HostKeyVerification::Unknown { fingerprint } => {
                if self.policy.strict {
                    warn!(
                        "Unknown host key for {}:{} (fingerprint: {}), strict mode enabled",
                        self.host, self.port, fingerprint
                    );
                    return Err(SshError::HostKeyRejected(format!(
                        "unknown host {}:{} with fingerprint {}",
                        self.host, self.port, fingerprint
                    )));
                }

                info!(
                    "New host {}:{}, adding to known_hosts (fingerprint: {})",
                    self.host, self.port, fingerprint
                );
                if let Err(e) = known_hosts.add_host(&self.host, self.port, server_public_key) {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(true)
            }
            HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint,
            } => Err(SshError::HostKeyRejected(format!(
                "key for {}:{} has changed (expected {}, got {})",
                self.host, self.port, expected_fingerprint, actual_fingerprint
            ))),
        }
    }
}
