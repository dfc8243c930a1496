//! In-memory transport used by the engine tests

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::path_utils::{is_absolute_remote_path, join_remote_path, remote_segments, segments_to_path};
use super::{Connector, RemoteWriter, TransportError, TransportSession};
use crate::ssh::SshError;

/// Shared remote state plus a log of every call made against it
#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub home: String,
    pub dirs: BTreeSet<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub calls: Vec<String>,
    pub connects: usize,
    pub closes: usize,
    pub reject_auth: bool,
    /// One entry per opened writer: `Some(k)` fails the write after `k`
    /// successful chunks
    pub writer_plan: VecDeque<Option<usize>>,
    /// Fails the next N `is_directory` calls with a dropped connection
    pub dir_failures: usize,
    pub bytes_written: u64,
}

impl MemoryState {
    pub fn new(home: &str) -> Arc<Mutex<Self>> {
        let mut state = Self {
            home: home.to_string(),
            ..Default::default()
        };
        state.add_dir(home);
        Arc::new(Mutex::new(state))
    }

    /// Add a directory and all of its parents
    pub fn add_dir(&mut self, path: &str) {
        let segments = remote_segments(path);
        for i in 1..=segments.len() {
            self.dirs.insert(segments_to_path(&segments[..i]));
        }
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path)
    }
}

pub(crate) struct MemoryConnector {
    pub state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(&self) -> Result<MemorySession, TransportError> {
        let mut state = self.state.lock();
        state.connects += 1;
        state.calls.push("connect".to_string());
        if state.reject_auth {
            return Err(SshError::AuthenticationFailed(
                "password login for user 'backup' rejected by server".to_string(),
            )
            .into());
        }
        Ok(MemorySession {
            state: self.state.clone(),
            cwd: state.home.clone(),
            last_error: Arc::new(Mutex::new(None)),
            broken: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub(crate) struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    cwd: String,
    last_error: Arc<Mutex<Option<String>>>,
    /// Set by a failed write; every later call on this session fails
    broken: Arc<AtomicBool>,
}

impl MemorySession {
    fn ensure_alive(&self, call: String) -> Result<(), TransportError> {
        self.state.lock().calls.push(call);
        if self.broken.load(Ordering::SeqCst) {
            return self.fail(TransportError::Disconnected("session closed".to_string()));
        }
        Ok(())
    }

    fn absolute(&self, path: &str) -> String {
        if is_absolute_remote_path(path) {
            path.to_string()
        } else {
            join_remote_path(&self.cwd, path)
        }
    }

    fn fail<T>(&self, err: TransportError) -> Result<T, TransportError> {
        *self.last_error.lock() = Some(err.to_string());
        Err(err)
    }
}

#[async_trait]
impl TransportSession for MemorySession {
    type Writer = MemoryWriter;

    async fn current_directory(&mut self) -> Result<String, TransportError> {
        self.ensure_alive("pwd".to_string())?;
        Ok(self.cwd.clone())
    }

    async fn is_directory(&mut self, path: &str) -> Result<bool, TransportError> {
        let path = self.absolute(path);
        self.ensure_alive(format!("is_dir {}", path))?;
        let mut state = self.state.lock();
        if state.dir_failures > 0 {
            state.dir_failures -= 1;
            drop(state);
            return self.fail(TransportError::Disconnected("channel closed".to_string()));
        }
        Ok(state.is_dir(&path))
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let path = self.absolute(path);
        self.ensure_alive(format!("mkdir {}", path))?;
        self.state.lock().dirs.insert(path);
        Ok(())
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let path = self.absolute(path);
        self.ensure_alive(format!("cd {}", path))?;
        let exists = self.state.lock().is_dir(&path);
        if !exists {
            return self.fail(TransportError::NotFound(path));
        }
        self.cwd = path;
        Ok(())
    }

    async fn file_size(&mut self, path: &str) -> Result<Option<u64>, TransportError> {
        let path = self.absolute(path);
        self.ensure_alive(format!("size {}", path))?;
        let state = self.state.lock();
        Ok(state.files.get(&path).map(|data| data.len() as u64))
    }

    async fn open_writer(
        &mut self,
        path: &str,
        offset: u64,
    ) -> Result<MemoryWriter, TransportError> {
        let path = self.absolute(path);
        self.ensure_alive(format!("open {} @{}", path, offset))?;
        let mut state = self.state.lock();
        let fail_after = state.writer_plan.pop_front().flatten();
        state.files.entry(path.clone()).or_default();
        Ok(MemoryWriter {
            state: self.state.clone(),
            path,
            offset,
            chunks: 0,
            fail_after,
            last_error: self.last_error.clone(),
            broken: self.broken.clone(),
        })
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.calls.push("close".to_string());
        Ok(())
    }
}

pub(crate) struct MemoryWriter {
    state: Arc<Mutex<MemoryState>>,
    path: String,
    offset: u64,
    chunks: usize,
    fail_after: Option<usize>,
    last_error: Arc<Mutex<Option<String>>>,
    broken: Arc<AtomicBool>,
}

#[async_trait]
impl RemoteWriter for MemoryWriter {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_after == Some(self.chunks) {
            let err = TransportError::Write(format!("{}: connection reset by peer", self.path));
            *self.last_error.lock() = Some(err.to_string());
            self.broken.store(true, Ordering::SeqCst);
            return Err(err);
        }

        let mut state = self.state.lock();
        let file = state.files.entry(self.path.clone()).or_default();
        let start = self.offset as usize;
        if file.len() < start + data.len() {
            file.resize(start + data.len(), 0);
        }
        file[start..start + data.len()].copy_from_slice(data);
        state.bytes_written += data.len() as u64;

        self.offset += data.len() as u64;
        self.chunks += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
