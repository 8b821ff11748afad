//! # Request Service
//!
//! Caller-facing entry point: prepares and saves requests, runs them
//! through the [`HttpEngine`] and records each outcome in history.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, Span};

use crate::error::{Error, PersistenceError, SaveError, ValidationError};
use crate::models::{HistoryEntry, Request, Response};
use crate::services::history::HistoryRepository;
use crate::services::http::{ExecutionContext, HttpEngine};
use crate::services::store::RequestRepository;

pub struct RequestService<H, R> {
    engine: HttpEngine,
    history: Arc<H>,
    requests: Arc<R>,
    span: Span,
}

impl<H, R> RequestService<H, R>
where
    H: HistoryRepository + 'static,
    R: RequestRepository,
{
    pub fn new(engine: HttpEngine, history: Arc<H>, requests: Arc<R>, span: Span) -> Self {
        Self {
            engine,
            history,
            requests,
            span,
        }
    }

    pub fn engine(&self) -> &HttpEngine {
        &self.engine
    }

    /// Make `request` ready to store: give it an id if it has none, stamp
    /// it and check it.
    pub fn create_request(&self, mut request: Request) -> Result<Request, ValidationError> {
        let _enter = self.span.enter();
        if request.id().trim().is_empty() {
            request.set_id(uuid::Uuid::new_v4().to_string());
        }
        request.touch();
        request.validate()?;
        tracing::debug!("Prepared request {} ({})", request.id(), request.method());
        Ok(request)
    }

    /// Store `request`, replacing any saved request with the same id.
    ///
    /// A replacement keeps the stored creation time and gets a fresh update
    /// time. Returns the request as stored.
    pub fn save_request(&self, request: &Request) -> Result<Request, SaveError> {
        let _enter = self.span.enter();
        request.validate()?;

        let mut stored = request.clone();
        let written = match self.requests.find_by_id(request.id()) {
            Ok(existing) => {
                stored.restore_timestamps(existing.created_at(), Utc::now());
                self.requests.update(&stored)
            }
            Err(PersistenceError::NotFound(_)) => self.requests.create(&stored),
            Err(e) => Err(e),
        };
        written.inspect_err(|e| tracing::error!("Failed to save request {}: {}", request.id(), e))?;

        tracing::info!("Saved request {} ({})", stored.id(), stored.name());
        Ok(stored)
    }

    pub fn load_request(&self, id: &str) -> Result<Request, PersistenceError> {
        let _enter = self.span.enter();
        self.requests
            .find_by_id(id)
            .inspect_err(|e| tracing::error!("Failed to load request {}: {}", id, e))
    }

    /// Saved requests, most recently created first.
    pub fn list_requests(&self) -> Result<Vec<Request>, PersistenceError> {
        let _enter = self.span.enter();
        let requests = self.requests.find_all()?;
        tracing::debug!("Loaded {} saved requests", requests.len());
        Ok(requests)
    }

    pub fn delete_request(&self, id: &str) -> Result<(), PersistenceError> {
        let _enter = self.span.enter();
        self.requests.delete(id).inspect_err(|e| {
            tracing::error!("Failed to delete request {}: {}", id, e);
        })?;
        tracing::info!("Deleted request {}", id);
        Ok(())
    }

    /// Execute once without recording.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        request: &Request,
    ) -> Result<Response, Error> {
        self.engine
            .execute(ctx, request)
            .instrument(self.span.clone())
            .await
    }

    /// Execute once and record the outcome.
    ///
    /// The outcome is returned unchanged whether or not recording worked.
    pub async fn execute_and_record(
        &self,
        ctx: &ExecutionContext,
        request: &Request,
    ) -> Result<Response, Error> {
        let outcome = self.execute(ctx, request).await;

        let entry = HistoryEntry::from_outcome(request, &outcome);
        let history = Arc::clone(&self.history);
        let span = self.span.clone();
        let saved = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            history.save(&entry).map(|()| entry.id)
        })
        .await;

        let _enter = self.span.enter();
        match saved {
            Ok(Ok(id)) => tracing::debug!("Recorded history entry {}", id),
            Ok(Err(e)) => tracing::error!(
                "Failed to record history for request {}: {}",
                request.id(),
                e
            ),
            Err(e) => tracing::error!(
                "History write for request {} did not complete: {}",
                request.id(),
                e
            ),
        }

        outcome
    }
}
