//! # Execution History
//!
//! Storage for [`HistoryEntry`] records behind the [`HistoryRepository`]
//! trait, an in-memory and a JSON-lines implementation, and the
//! [`HistoryService`] that callers query.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::Span;

use crate::error::PersistenceError;
use crate::models::HistoryEntry;

/// Persistence collaborator for execution history.
///
/// Listings are newest first. A `limit` of zero means no limit.
pub trait HistoryRepository: Send + Sync {
    fn save(&self, entry: &HistoryEntry) -> Result<(), PersistenceError>;

    fn find_by_id(&self, id: &str) -> Result<HistoryEntry, PersistenceError>;

    fn find_all(&self, limit: usize) -> Result<Vec<HistoryEntry>, PersistenceError>;

    fn find_by_request_id(
        &self,
        request_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError>;

    fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// Remove every entry executed before `cutoff`, returning how many went.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError>;
}

/// Order stored entries newest first and apply `limit`.
///
/// Entries are stored oldest first, so ties keep the later save in front.
fn newest_first<'a, I>(entries: I, limit: usize) -> Vec<HistoryEntry>
where
    I: DoubleEndedIterator<Item = &'a HistoryEntry>,
{
    let mut listed: Vec<HistoryEntry> = entries.rev().cloned().collect();
    listed.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
    if limit > 0 {
        listed.truncate(limit);
    }
    listed
}

/// Keeps history in process memory.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<HistoryEntry>>, PersistenceError> {
        self.entries.lock().map_err(|_| PersistenceError::Poisoned)
    }
}

impl HistoryRepository for MemoryHistory {
    fn save(&self, entry: &HistoryEntry) -> Result<(), PersistenceError> {
        self.lock()?.push(entry.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<HistoryEntry, PersistenceError> {
        self.lock()?
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn find_all(&self, limit: usize) -> Result<Vec<HistoryEntry>, PersistenceError> {
        Ok(newest_first(self.lock()?.iter(), limit))
    }

    fn find_by_request_id(
        &self,
        request_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let entries = self.lock()?;
        let matching: Vec<&HistoryEntry> =
            entries.iter().filter(|e| e.request_id == request_id).collect();
        Ok(newest_first(matching.into_iter(), limit))
    }

    fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|e| e.executed_at >= cutoff);
        Ok(before - entries.len())
    }
}

/// Keeps history in a file, one JSON object per line.
///
/// Saves append; deletes rewrite the file.
#[derive(Debug)]
pub struct FileHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileHistory {
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

    fn read_all(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "Skipping malformed history record at {}:{}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ),
            }
        }
        Ok(entries)
    }

    fn write_all(&self, entries: &[HistoryEntry]) -> Result<(), PersistenceError> {
        let staging = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            for entry in entries {
                serde_json::to_writer(&mut writer, entry)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl HistoryRepository for FileHistory {
    fn save(&self, entry: &HistoryEntry) -> Result<(), PersistenceError> {
        let _guard = self.guard()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(&line)?;
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<HistoryEntry, PersistenceError> {
        let _guard = self.guard()?;
        self.read_all()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn find_all(&self, limit: usize) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let _guard = self.guard()?;
        Ok(newest_first(self.read_all()?.iter(), limit))
    }

    fn find_by_request_id(
        &self,
        request_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let _guard = self.guard()?;
        let entries = self.read_all()?;
        let matching: Vec<&HistoryEntry> =
            entries.iter().filter(|e| e.request_id == request_id).collect();
        Ok(newest_first(matching.into_iter(), limit))
    }

    fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let _guard = self.guard()?;
        let mut entries = self.read_all()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        self.write_all(&entries)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let _guard = self.guard()?;
        let mut entries = self.read_all()?;
        let before = entries.len();
        entries.retain(|e| e.executed_at >= cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            self.write_all(&entries)?;
        }
        Ok(removed)
    }
}

/// Read and maintenance operations over stored history.
#[derive(Debug)]
pub struct HistoryService<H> {
    repository: Arc<H>,
    span: Span,
}

impl<H: HistoryRepository> HistoryService<H> {
    pub fn new(repository: Arc<H>, span: Span) -> Self {
        Self { repository, span }
    }

    /// Most recent executions across all requests.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let _enter = self.span.enter();
        let entries = self.repository.find_all(limit)?;
        tracing::debug!("Loaded {} history entries", entries.len());
        Ok(entries)
    }

    pub fn request_history(
        &self,
        request_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let _enter = self.span.enter();
        self.repository.find_by_request_id(request_id, limit)
    }

    pub fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let _enter = self.span.enter();
        self.repository.delete(id).inspect_err(|e| {
            tracing::error!("Failed to delete history entry {}: {}", id, e);
        })
    }

    /// Drop entries older than `days` days.
    pub fn cleanup_older_than(&self, days: u32) -> Result<usize, PersistenceError> {
        let _enter = self.span.enter();
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let removed = self.repository.delete_older_than(cutoff)?;
        tracing::info!("Removed {} history entries older than {} days", removed, days);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    fn entry(id: &str, request_id: &str, age_days: i64) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            request_id: request_id.to_string(),
            executed_at: Utc::now() - Duration::days(age_days),
            method: "GET".to_string(),
            url: format!("http://example.com/{id}"),
            status_code: 200,
            status: "200 OK".to_string(),
            response_time_ms: 12,
            response_headers: HashMap::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            response_body: "{}".to_string(),
            error: None,
        }
    }

    fn ids(entries: &[HistoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn exercise(repo: &dyn HistoryRepository) {
        repo.save(&entry("old", "r1", 10)).unwrap();
        repo.save(&entry("mid", "r2", 5)).unwrap();
        repo.save(&entry("new", "r1", 0)).unwrap();

        assert_eq!(ids(&repo.find_all(0).unwrap()), ["new", "mid", "old"]);
        assert_eq!(ids(&repo.find_all(2).unwrap()), ["new", "mid"]);
        assert_eq!(ids(&repo.find_by_request_id("r1", 0).unwrap()), ["new", "old"]);
        assert_eq!(ids(&repo.find_by_request_id("r1", 1).unwrap()), ["new"]);
        assert!(repo.find_by_request_id("nope", 0).unwrap().is_empty());

        let found = repo.find_by_id("mid").unwrap();
        assert_eq!(found.request_id, "r2");
        assert_eq!(found.url, "http://example.com/mid");
        assert_eq!(
            found.response_headers.get("content-type").map(String::as_str),
            Some("application/json")
        );

        repo.delete("mid").unwrap();
        assert!(matches!(
            repo.find_by_id("mid"),
            Err(PersistenceError::NotFound(id)) if id == "mid"
        ));
        assert!(matches!(
            repo.delete("mid"),
            Err(PersistenceError::NotFound(_))
        ));

        let removed = repo
            .delete_older_than(Utc::now() - Duration::days(7))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(ids(&repo.find_all(0).unwrap()), ["new"]);
    }

    #[test]
    fn memory_history_should_store_list_and_delete() {
        exercise(&MemoryHistory::new());
    }

    #[test]
    fn file_history_should_store_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileHistory::new(dir.path().join("nested").join("history.jsonl"));
        exercise(&repo);

        let contents = fs::read_to_string(repo.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn file_history_should_start_empty_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileHistory::new(dir.path().join("missing.jsonl"));
        assert!(repo.find_all(0).unwrap().is_empty());
        assert_eq!(repo.delete_older_than(Utc::now()).unwrap(), 0);
    }

    #[test]
    fn file_history_should_skip_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&entry("good", "r", 0)).unwrap();
        fs::write(&path, format!("{{not json\n\n{good}\n")).unwrap();

        let repo = FileHistory::new(&path);
        assert_eq!(ids(&repo.find_all(0).unwrap()), ["good"]);
    }

    #[test]
    fn equal_timestamps_should_list_latest_save_first() {
        let repo = MemoryHistory::new();
        let first = entry("first", "r", 0);
        let mut second = entry("second", "r", 0);
        second.executed_at = first.executed_at;
        repo.save(&first).unwrap();
        repo.save(&second).unwrap();

        assert_eq!(ids(&repo.find_all(0).unwrap()), ["second", "first"]);
    }

    #[test]
    fn service_should_clean_up_by_age() {
        let repo = Arc::new(MemoryHistory::new());
        repo.save(&entry("ancient", "r", 40)).unwrap();
        repo.save(&entry("recent", "r", 1)).unwrap();

        let service = HistoryService::new(repo, Span::none());

        assert_eq!(service.cleanup_older_than(30).unwrap(), 1);
        assert_eq!(ids(&service.history(0).unwrap()), ["recent"]);
        assert_eq!(ids(&service.request_history("r", 10).unwrap()), ["recent"]);
        service.delete("recent").unwrap();
        assert!(service.history(0).unwrap().is_empty());
        assert!(service.delete("recent").is_err());
    }
}
