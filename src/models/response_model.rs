//! # HTTP Response Model
//!
//! The normalized result of one execution: status, headers, body and timing,
//! plus pure helpers that classify the status and content type.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP response model containing all response data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Numeric status code (e.g. 200)
    pub status_code: u16,
    /// Status text (e.g. "200 OK")
    pub status: String,
    /// Response headers; repeated values are joined with ", "
    pub headers: HashMap<String, String>,
    /// Response body content
    pub body: String,
    /// Body size in bytes
    pub content_length: u64,
    /// Time from send to fully-read body
    pub duration: Duration,
    /// When the response was received
    pub timestamp: DateTime<Utc>,
    /// Identifier of the originating request, for correlation only
    pub request_id: String,
}

impl Response {
    /// Create an empty response stamped with the current time.
    pub fn new() -> Self {
        Self {
            status_code: 0,
            status: String::new(),
            headers: HashMap::new(),
            body: String::new(),
            content_length: 0,
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            request_id: String::new(),
        }
    }

    /// Check if the status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if the status indicates a redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Check if the status indicates client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Check if the status indicates server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }

    /// Check if the status is informational (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status_code)
    }

    /// Client or server error
    pub fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    /// Human-readable label for the status class (e.g. "2xx Success")
    pub fn status_class(&self) -> &'static str {
        if self.is_informational() {
            "1xx Informational"
        } else if self.is_success() {
            "2xx Success"
        } else if self.is_redirect() {
            "3xx Redirect"
        } else if self.is_client_error() {
            "4xx Client Error"
        } else if self.is_server_error() {
            "5xx Server Error"
        } else {
            "Unknown"
        }
    }

    /// Look up a header, trying an exact match before a case-insensitive one.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value);
        }
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Get content type from response headers
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_json(&self) -> bool {
        self.content_type_contains(&["application/json", "application/vnd.api+json"])
    }

    pub fn is_xml(&self) -> bool {
        self.content_type_contains(&["application/xml", "text/xml"])
    }

    pub fn is_html(&self) -> bool {
        self.content_type_contains(&["text/html"])
    }

    pub fn is_text(&self) -> bool {
        self.content_type_contains(&["text/plain"])
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    fn content_type_contains(&self, needles: &[&str]) -> bool {
        let Some(content_type) = self.content_type() else {
            return false;
        };
        let content_type = content_type.to_ascii_lowercase();
        needles.iter().any(|needle| content_type.contains(needle))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
