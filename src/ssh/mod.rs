//! SSH module - connection and authentication for the SFTP backend
//!
//! Built on the russh library.
//!
//! # Features
//! - Password or private key authentication (key passphrase optional)
//! - Host key verification via known_hosts
//! - Connection timeout and keepalive

mod client;
mod config;
mod error;
pub mod known_hosts;

pub use client::{ClientHandler, SshClient, SshHandle};
pub(crate) use config::{default_port, default_timeout};
pub use config::{Credentials, Endpoint, HostKeyPolicy};
pub use error::SshError;
pub use known_hosts::{HostKeyVerification, KnownHostsStore};
