//! Execution, decoding, history and saved-request services.

mod classify;
mod decode;
pub mod history;
pub mod http;
pub mod request;
pub mod store;

pub use history::{FileHistory, HistoryRepository, HistoryService, MemoryHistory};
pub use http::{build_wire_request, ClientConfig, ExecutionContext, HttpEngine};
pub use request::RequestService;
pub use store::{FileRequests, MemoryRequests, RequestRepository};
