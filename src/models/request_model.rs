//! # HTTP Request Model
//!
//! The request a user describes before execution: method, URL, headers,
//! query parameters, body and authentication, plus identity and timestamps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::auth::AuthStrategy;

/// Type alias for header and query-parameter maps
pub type NameValueMap = BTreeMap<String, String>;

/// HTTP methods a request may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Only POST, PUT and PATCH ever carry a body on the wire.
    pub fn allows_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ValidationError::EmptyMethod);
        }
        let upper = s.to_ascii_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| ValidationError::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// HTTP request model
///
/// Cloning copies the header and query maps, so a clone can be edited
/// without affecting the original. The auth strategy is shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    id: String,
    #[serde(default)]
    name: String,
    method: String,
    url: String,
    #[serde(default)]
    headers: NameValueMap,
    #[serde(default)]
    query_params: NameValueMap,
    #[serde(default)]
    body: String,
    #[serde(default)]
    auth: Arc<AuthStrategy>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Request {
    /// Create a GET request with a fresh identifier and no auth.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            method: HttpMethod::Get.as_str().to_string(),
            url: String::new(),
            headers: NameValueMap::new(),
            query_params: NameValueMap::new(),
            body: String::new(),
            auth: Arc::new(AuthStrategy::None),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_method_and_url(method: &str, url: &str) -> Self {
        let mut request = Self::new();
        request.method = method.to_ascii_uppercase();
        request.url = url.to_string();
        request
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: String) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
        self.touch();
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Stored uppercase; validity is checked by [`Request::validate`].
    pub fn set_method(&mut self, method: &str) {
        self.method = method.to_ascii_uppercase();
        self.touch();
    }

    /// Parsed method, or the validation error it would raise.
    pub fn http_method(&self) -> Result<HttpMethod, ValidationError> {
        self.method.parse()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: String) {
        self.url = url;
        self.touch();
    }

    pub fn headers(&self) -> &NameValueMap {
        &self.headers
    }

    /// Set a header, replacing any header of the same name in any case.
    /// An empty value removes it.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.take_header(name);
        if !value.is_empty() {
            self.headers.insert(name.to_string(), value.to_string());
        }
        self.touch();
    }

    /// Header names compare case-insensitively.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let removed = self.take_header(name);
        self.touch();
        removed
    }

    fn take_header(&mut self, name: &str) -> Option<String> {
        let existing = self
            .headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&existing)
    }

    pub fn query_params(&self) -> &NameValueMap {
        &self.query_params
    }

    /// Set a query parameter. An empty value removes it.
    pub fn set_query_param(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.query_params.remove(name);
        } else {
            self.query_params
                .insert(name.to_string(), value.to_string());
        }
        self.touch();
    }

    pub fn remove_query_param(&mut self, name: &str) -> Option<String> {
        let removed = self.query_params.remove(name);
        self.touch();
        removed
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
        self.touch();
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    pub fn shared_auth(&self) -> &Arc<AuthStrategy> {
        &self.auth
    }

    pub fn set_auth(&mut self, auth: AuthStrategy) {
        self.set_shared_auth(Arc::new(auth));
    }

    pub fn set_shared_auth(&mut self, auth: Arc<AuthStrategy>) {
        self.auth = auth;
        self.touch();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Used when a stored request is reconstructed.
    pub fn restore_timestamps(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// True when the method is one that carries a body.
    pub fn is_body_allowed(&self) -> bool {
        self.http_method().is_ok_and(|m| m.allows_body())
    }

    /// The body to send, if the method allows one and it is non-empty.
    pub fn wire_body(&self) -> Option<&str> {
        (self.is_body_allowed() && !self.body.is_empty()).then_some(self.body.as_str())
    }

    /// Run every check in order and stop at the first failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_method()?;
        self.validate_url()?;
        self.validate_headers()?;
        self.validate_query_params()?;
        self.auth.validate()?;
        Ok(())
    }

    pub fn validate_method(&self) -> Result<(), ValidationError> {
        self.http_method().map(|_| ())
    }

    pub fn validate_url(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        let invalid = || ValidationError::InvalidUrl(self.url.clone());
        let parsed = Url::parse(&self.url).map_err(|_| invalid())?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid());
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(invalid());
        }
        Ok(())
    }

    /// Header names must be non-blank and free of ':', '\r' and '\n'.
    pub fn validate_headers(&self) -> Result<(), ValidationError> {
        match self
            .headers
            .keys()
            .find(|name| name.trim().is_empty() || name.contains([':', '\r', '\n']))
        {
            Some(name) => Err(ValidationError::InvalidHeaderName(name.clone())),
            None => Ok(()),
        }
    }

    pub fn validate_query_params(&self) -> Result<(), ValidationError> {
        match self.query_params.keys().find(|name| name.trim().is_empty()) {
            Some(name) => Err(ValidationError::InvalidQueryParam(name.clone())),
            None => Ok(()),
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
