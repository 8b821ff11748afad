//! # Saved Requests
//!
//! Storage for named [`Request`]s behind the [`RequestRepository`] trait,
//! with an in-memory and a JSON-lines implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::PersistenceError;
use crate::models::Request;

/// Persistence collaborator for saved requests, keyed by request id.
pub trait RequestRepository: Send + Sync {
    /// Fails with [`PersistenceError::AlreadyExists`] when the id is taken.
    fn create(&self, request: &Request) -> Result<(), PersistenceError>;

    fn find_by_id(&self, id: &str) -> Result<Request, PersistenceError>;

    /// Every saved request, most recently created first.
    fn find_all(&self) -> Result<Vec<Request>, PersistenceError>;

    fn update(&self, request: &Request) -> Result<(), PersistenceError>;

    fn delete(&self, id: &str) -> Result<(), PersistenceError>;
}

fn newest_first(requests: &[Request]) -> Vec<Request> {
    let mut listed: Vec<Request> = requests.iter().rev().cloned().collect();
    listed.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
    listed
}

fn insert(requests: &mut Vec<Request>, request: &Request) -> Result<(), PersistenceError> {
    if requests.iter().any(|r| r.id() == request.id()) {
        return Err(PersistenceError::AlreadyExists(request.id().to_string()));
    }
    requests.push(request.clone());
    Ok(())
}

fn replace(requests: &mut [Request], request: &Request) -> Result<(), PersistenceError> {
    let slot = requests
        .iter_mut()
        .find(|r| r.id() == request.id())
        .ok_or_else(|| PersistenceError::NotFound(request.id().to_string()))?;
    *slot = request.clone();
    Ok(())
}

fn remove(requests: &mut Vec<Request>, id: &str) -> Result<(), PersistenceError> {
    let before = requests.len();
    requests.retain(|r| r.id() != id);
    if requests.len() == before {
        return Err(PersistenceError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Keeps saved requests in process memory.
#[derive(Debug, Default)]
pub struct MemoryRequests {
    requests: Mutex<Vec<Request>>,
}

impl MemoryRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Request>>, PersistenceError> {
        self.requests.lock().map_err(|_| PersistenceError::Poisoned)
    }
}

impl RequestRepository for MemoryRequests {
    fn create(&self, request: &Request) -> Result<(), PersistenceError> {
        insert(&mut *self.lock()?, request)
    }

    fn find_by_id(&self, id: &str) -> Result<Request, PersistenceError> {
        self.lock()?
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn find_all(&self) -> Result<Vec<Request>, PersistenceError> {
        Ok(newest_first(&self.lock()?))
    }

    fn update(&self, request: &Request) -> Result<(), PersistenceError> {
        replace(&mut self.lock()?, request)
    }

    fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        remove(&mut *self.lock()?, id)
    }
}

/// Keeps saved requests in a file, one JSON object per line.
///
/// Creates append; updates and deletes rewrite the file.
#[derive(Debug)]
pub struct FileRequests {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRequests {
    /// The file and its parent directories are created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, PersistenceError> {
        self.lock.lock().map_err(|_| PersistenceError::Poisoned)
    }

    fn read_all(&self) -> Result<Vec<Request>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut requests = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Request>(&line) {
                Ok(request) => requests.push(request),
                Err(e) => tracing::warn!(
                    "Skipping malformed saved request at {}:{}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ),
            }
        }
        Ok(requests)
    }

    fn write_all(&self, requests: &[Request]) -> Result<(), PersistenceError> {
        let staging = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            for request in requests {
                serde_json::to_writer(&mut writer, request)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl RequestRepository for FileRequests {
    fn create(&self, request: &Request) -> Result<(), PersistenceError> {
        let _guard = self.guard()?;
        // Only the duplicate check matters here; the record is appended.
        insert(&mut self.read_all()?, request)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(&line)?;
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Request, PersistenceError> {
        let _guard = self.guard()?;
        self.read_all()?
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn find_all(&self) -> Result<Vec<Request>, PersistenceError> {
        let _guard = self.guard()?;
        Ok(newest_first(&self.read_all()?))
    }

    fn update(&self, request: &Request) -> Result<(), PersistenceError> {
        let _guard = self.guard()?;
        let mut requests = self.read_all()?;
        replace(&mut requests, request)?;
        self.write_all(&requests)
    }

    fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let _guard = self.guard()?;
        let mut requests = self.read_all()?;
        remove(&mut requests, id)?;
        self.write_all(&requests)
    }
}
