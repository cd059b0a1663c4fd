//! # Sextant Server
//!
//! HTTP front end for Sextant services:
//!
//! - HTTP/1.1 via Hyper on Tokio
//! - a method + path [`Router`] that services bind into through
//!   [`RouteBinder`](sextant_core::RouteBinder)
//! - a pluggable [`ErrorPolicy`] for failed dispatches
//! - body size and time limits
//! - graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use sextant_core::{Context, MethodEntry, Service, ServiceDescriptor};
//! use sextant_server::{Server, ShutdownSignal};
//!
//! struct Health;
//!
//! impl Service for Health {
//!     const NAME: &'static str = "health";
//!     fn methods() -> Vec<MethodEntry<Self>> {
//!         Vec::new()
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let health = ServiceDescriptor::build(Health)?;
//!
//! let mut server = Server::builder().http_addr("127.0.0.1:8080").build();
//! server.mount(&health)?;
//! server.run_with_shutdown(ShutdownSignal::with_os_signals()).await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/sextant-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod policy;
mod router;
mod server;
mod shutdown;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use policy::{
    envelope_response, error_response, ErrorInfo, ErrorPolicy, JsonErrorPolicy, PanicPolicy,
};
pub use router::{RouteMatch, Router};
pub use server::{
    HttpResponse, ResponseBody, Server, ServerBuilder, ServerError, REQUEST_ID_HEADER,
};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
