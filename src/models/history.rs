//! # History Entry
//!
//! One recorded execution of a request, successful or not.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{Request, Response};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// May be empty for ad-hoc requests
    pub request_id: String,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub response_time_ms: u64,
    #[serde(default)]
    pub response_headers: HashMap<String, String>,
    #[serde(default)]
    pub response_body: String,
    /// Set when the execution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    /// Record the outcome of executing `request`.
    ///
    /// Failures keep the error message and, when the call reached the
    /// network, the time spent before it failed.
    pub fn from_outcome(request: &Request, outcome: &Result<Response, Error>) -> Self {
        let mut entry = Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request.id().to_string(),
            executed_at: Utc::now(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            status_code: 0,
            status: String::new(),
            response_time_ms: 0,
            response_headers: HashMap::new(),
            response_body: String::new(),
            error: None,
        };

        match outcome {
            Ok(response) => {
                entry.status_code = response.status_code;
                entry.status = response.status.clone();
                entry.response_time_ms = response.duration_millis();
                entry.response_headers = response.headers.clone();
                entry.response_body = response.body.clone();
            }
            Err(e) => {
                entry.error = Some(e.to_string());
                entry.response_time_ms = e.elapsed().map_or(0, |d| d.as_millis() as u64);
            }
        }

        entry
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
