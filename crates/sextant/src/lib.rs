//! # Sextant
//!
//! **Method-introspection RPC dispatcher over HTTP**
//!
//! Write plain methods on a service type and Sextant turns them into JSON
//! endpoints:
//!
//! - `#[service]` records each public method's signature at compile time
//! - registration validates every method against the calling convention
//!   and refuses the whole service on the first violation
//! - each request decodes the JSON body, calls the method and encodes its
//!   JSON result
//!
//! ## Calling convention
//!
//! | Shape | Body | Response |
//! |-------|------|----------|
//! | `fn m(&self, ctx: &Context) -> Result<(), E>` | ignored | empty |
//! | `fn m(&self, ctx: &Context) -> Result<Resp, E>` | ignored | JSON |
//! | `fn m(&self, ctx: &Context, req: Req) -> Result<(), E>` | JSON | empty |
//! | `fn m(&self, ctx: &Context, req: Req) -> Result<Resp, E>` | JSON | JSON |
//!
//! Methods may be `async`. `E` converts into `anyhow::Error`; a
//! [`ServiceError`](core::ServiceError) keeps its status code.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sextant::prelude::*;
//!
//! #[derive(Default)]
//! struct JobsApi { /* ... */ }
//!
//! #[service]
//! impl JobsApi {
//!     pub fn list(&self, _ctx: &Context) -> Result<JobsList, ServiceError> { /* ... */ }
//!     pub async fn create(&self, _ctx: &Context, job: Job) -> Result<Job, ServiceError> { /* ... */ }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut jobs = ServiceDescriptor::build(JobsApi::default())?;
//!     jobs.get("/", "list")?.post("/", "create")?;
//!
//!     let mut server = Server::builder().http_addr("0.0.0.0:8080").build();
//!     server.bind(&jobs, "/jobs")?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/sextant/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use sextant_core as core;

// Re-export server types
pub use sextant_server as server;

// Re-export telemetry
pub use sextant_telemetry as telemetry;

// Re-export configuration
pub use sextant_config as config;

// Re-export the service attribute macro
pub use sextant_macros::service;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sextant_core::{
        build_service, Context, DispatchError, ErrorCategory, RegistrationError, Service,
        ServiceDescriptor, ServiceError, ServiceResult, Verb,
    };

    pub use sextant_server::{Server, ServerConfig, ServerError, ShutdownSignal};

    pub use sextant_config::{ConfigLoader, SextantConfig};

    pub use sextant_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};

    pub use sextant_macros::service;
}
