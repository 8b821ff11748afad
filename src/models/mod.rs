//! # Models Module
//!
//! Domain entities: what a user asks for, what comes back, how it
//! authenticates, and what gets recorded in history.

pub mod auth;
pub mod history;
pub mod request_model;
pub mod response_model;

pub use auth::{ApiKeyLocation, AuthRecord, AuthStrategy};
pub use history::HistoryEntry;
pub use request_model::{HttpMethod, NameValueMap, Request};
pub use response_model::Response;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_models_should_create_with_defaults() {
        let request = Request::new();
        let response = Response::new();
        let auth = AuthStrategy::default();

        assert_eq!(request.http_method(), Ok(HttpMethod::Get));
        assert_eq!(response.status_class(), "Unknown");
        assert!(auth.is_none());
    }
}
