//! Known hosts verification for backup endpoints
//!
//! Reads and appends OpenSSH `known_hosts` files. Hashed entries (`|1|...`)
//! are skipped.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::SshError;

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyVerification {
    /// Key matches known_hosts entry
    Verified,
    /// Host not in known_hosts (first connection)
    Unknown { fingerprint: String },
    /// Key changed from known_hosts entry (potential MITM)
    Changed {
        expected_fingerprint: String,
        actual_fingerprint: String,
    },
}

#[derive(Clone, Debug)]
struct HostKeyEntry {
    key_type: String,
    key_data: String,
}

/// known_hosts contents cached for one connection attempt
pub struct KnownHostsStore {
    hosts: RwLock<HashMap<String, Vec<HostKeyEntry>>>,
    path: PathBuf,
}

impl KnownHostsStore {
    /// Load the store from `path`; a missing file is an empty store
    pub fn with_path(path: PathBuf) -> Self {
        let store = Self {
            hosts: RwLock::new(HashMap::new()),
            path,
        };

        if let Err(e) = store.load() {
            debug!("Known hosts file not found or unreadable: {}", e);
        }

        store
    }

    fn load(&self) -> Result<(), SshError> {
        if !self.path.exists() {
            return Ok(());
        }

        let file = fs::File::open(&self.path)?;
        let mut hosts = self.hosts.write();

        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // hostname[,alias] keytype base64key [comment]
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let entry = HostKeyEntry {
                key_type: parts[1].to_string(),
                key_data: parts[2].to_string(),
            };

            for hostname in parts[0].split(',') {
                if hostname.starts_with('|') {
                    continue;
                }
                hosts
                    .entry(Self::normalize_entry(hostname))
                    .or_default()
                    .push(entry.clone());
            }
        }

        debug!("Loaded {} known hosts from {:?}", hosts.len(), self.path);
        Ok(())
    }

    /// `host` and `[host]:port` entries keep their own lookup keys
    fn normalize_entry(host: &str) -> String {
        host.to_lowercase()
    }

    fn make_key(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        }
    }

    /// SHA256 fingerprint in OpenSSH notation
    pub fn fingerprint(key: &PublicKey) -> String {
        Self::fingerprint_bytes(&key.public_key_bytes())
    }

    fn fingerprint_bytes(bytes: &[u8]) -> String {
        let hash = Sha256::digest(bytes);
        format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
    }

    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerification {
        let lookup_key = Self::make_key(host, port);
        let actual_b64 = BASE64.encode(key.public_key_bytes());
        let actual_type = key.algorithm().as_str().to_string();
        let fingerprint = Self::fingerprint(key);

        let hosts = self.hosts.read();
        let Some(entries) = hosts.get(&lookup_key) else {
            debug!("Unknown host: {}", lookup_key);
            return HostKeyVerification::Unknown { fingerprint };
        };

        let mut same_type = entries.iter().filter(|e| e.key_type == actual_type).peekable();
        let Some(first) = same_type.peek().copied() else {
            // Host known, but not for this key type
            return HostKeyVerification::Unknown { fingerprint };
        };

        // A host may be listed more than once per key type during rotation
        if same_type.any(|entry| entry.key_data == actual_b64) {
            return HostKeyVerification::Verified;
        }

        let expected_fingerprint = BASE64
            .decode(&first.key_data)
            .map(|bytes| Self::fingerprint_bytes(&bytes))
            .unwrap_or_else(|_| "unknown".to_string());
        warn!(
            "HOST KEY CHANGED for {} (type: {})! Expected {}, got {}",
            lookup_key, actual_type, expected_fingerprint, fingerprint
        );
        HostKeyVerification::Changed {
            expected_fingerprint,
            actual_fingerprint: fingerprint,
        }
    }

    /// Record a host key in memory and append it to the file
    pub fn add_host(&self, host: &str, port: u16, key: &PublicKey) -> Result<(), SshError> {
        let lookup_key = Self::make_key(host, port);
        let key_type = key.algorithm().as_str().to_string();
        let key_data = BASE64.encode(key.public_key_bytes());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {} {}", lookup_key, key_type, key_data)?;

        self.hosts
            .write()
            .entry(lookup_key.clone())
            .or_default()
            .push(HostKeyEntry { key_type, key_data });

        info!("Added host key for {} to {:?}", lookup_key, self.path);
        Ok(())
    }
}
