//! # sendline - HTTP Request Execution Engine
//!
//! Build HTTP requests, run them with explicit timeout, redirect and TLS
//! policy, and get back a normalized response or a classified failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   validate / build / auth   ┌──────────────┐
//! │   Request   │────────────────────────────►│  HttpEngine  │
//! └─────────────┘                             └──────┬───────┘
//!        ▲                                           │ Response | ExecutionError
//!        │                                           ▼
//! ┌──────┴───────┐      HistoryEntry          ┌──────────────┐
//! │RequestService│───────────────────────────►│  Repository  │
//! └──────────────┘                            └──────────────┘
//! ```
//!
//! ```no_run
//! use sendline::{ClientConfig, ExecutionContext, HttpEngine, Request};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = HttpEngine::new(ClientConfig::default())?;
//! let request = Request::with_method_and_url("GET", "https://example.com/api");
//! let response = engine.execute(&ExecutionContext::new(), &request).await?;
//! println!("{} in {:?}", response.status, response.duration);
//! # Ok(())
//! # }
//! ```

pub mod cmd_args;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
mod utils;

// Re-export main types for easy access
pub use error::{
    AuthError, EngineBuildError, Error, ExecutionError, ExecutionErrorKind, PersistenceError,
    SaveError, ValidationError,
};
pub use models::{
    ApiKeyLocation, AuthRecord, AuthStrategy, HistoryEntry, HttpMethod, NameValueMap, Request,
    Response,
};
pub use services::{
    build_wire_request, ClientConfig, ExecutionContext, FileHistory, FileRequests,
    HistoryRepository, HistoryService, HttpEngine, MemoryHistory, MemoryRequests,
    RequestRepository, RequestService,
};
