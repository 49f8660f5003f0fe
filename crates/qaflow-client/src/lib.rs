//! Client for the remote QA process service.
//!
//! Provides the `ProcessService` trait the pipeline's step runners call,
//! `HttpProcessService` (multipart uploads over `reqwest`), `ServiceConfig`,
//! and the response shapes returned by the service.

mod config;
mod http;
mod service;
mod types;

pub use config::*;
pub use http::HttpProcessService;
pub use service::*;
pub use types::*;
