//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use sendline::{ClientConfig, HttpEngine};
use serde_json::json;
use wiremock::{Request, Respond, ResponseTemplate};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("SENDLINE_LOG"))
        .with_test_writer()
        .try_init();
}

pub fn engine(config: ClientConfig) -> HttpEngine {
    init_tracing();
    HttpEngine::new(config).expect("engine should build")
}

pub fn default_engine() -> HttpEngine {
    engine(ClientConfig::default())
}

pub fn engine_with_timeout(timeout: Duration) -> HttpEngine {
    engine(ClientConfig {
        timeout,
        ..ClientConfig::default()
    })
}

/// Answers with a JSON description of the request it received, and reflects
/// `Accept` and `X-*` request headers onto the response.
pub struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let headers: BTreeMap<String, String> = request
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let mut template = ResponseTemplate::new(200).set_body_json(json!({
            "method": request.method.as_str(),
            "path": request.url.path(),
            "query": request.url.query().unwrap_or_default(),
            "headers": headers,
            "body": String::from_utf8_lossy(&request.body),
        }));
        for (name, value) in &headers {
            if name == "accept" || name.starts_with("x-") {
                template = template.insert_header(name.as_str(), value.as_str());
            }
        }
        template
    }
}

/// Redirects `/loop/N` to `/loop/N+1` forever.
pub struct RedirectLoop;

impl Respond for RedirectLoop {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let hop: u32 = request
            .url
            .path()
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        ResponseTemplate::new(302).insert_header("Location", format!("/loop/{}", hop + 1).as_str())
    }
}
