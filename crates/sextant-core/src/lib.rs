//! # Sextant Core
//!
//! Signature validation and dispatch engine for Sextant services.
//!
//! A service is a plain type whose public methods follow one calling
//! convention: a shared receiver, a [`Context`], an optional owned request,
//! and a `Result` carrying an optional response. The `#[service]` attribute
//! from `sextant-macros` turns an `impl` block into a method table
//! ([`Service::methods`]); this crate validates that table once and turns
//! each method into an [`Endpoint`] that a router can call per request.
//!
//! - [`ServiceDescriptor`] - validated, routable view of one service object
//! - [`MethodSignature`] / [`validate`] - the calling-convention checker
//! - [`Invoker`] - type-erased bound callable for one method shape
//! - [`execute`] - decode, invoke, encode
//! - [`RouteBinder`] - the seam to whatever router serves the endpoints
//! - [`Context`] - per-request capability handed to every method
//!
//! # Example
//!
//! ```
//! use sextant_core::{
//!     Context, Invoker, MethodEntry, MethodSignature, Receiver, Service, ServiceDescriptor,
//!     ServiceError, TypeTag,
//! };
//! use std::sync::Arc;
//!
//! struct Ping;
//!
//! impl Ping {
//!     fn ping(&self, _ctx: &Context) -> Result<String, ServiceError> {
//!         Ok("pong".to_string())
//!     }
//! }
//!
//! impl Service for Ping {
//!     const NAME: &'static str = "Ping";
//!
//!     fn methods() -> Vec<MethodEntry<Self>> {
//!         vec![MethodEntry::new(
//!             MethodSignature::new(
//!                 "ping",
//!                 Receiver::Shared,
//!                 vec![TypeTag::Context],
//!                 vec![TypeTag::payload("String"), TypeTag::error("ServiceError")],
//!                 false,
//!             ),
//!             Some(Invoker::reply(|svc: Arc<Self>, ctx: Context| async move {
//!                 svc.ping(&ctx)
//!             })),
//!         )]
//!     }
//! }
//!
//! let descriptor = ServiceDescriptor::build(Ping).unwrap();
//! assert_eq!(descriptor.path(), "/Ping");
//! assert!(descriptor.method("ping").is_some());
//! ```

#![doc(html_root_url = "https://docs.rs/sextant-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod context;
mod descriptor;
mod error;
mod executor;
mod invoker;
mod service;
mod signature;

pub use binder::{join_path, BindError, Endpoint, RouteBinder, Verb};
pub use context::{Context, ContextBuilder, Params, RequestId, ResponseParts};
pub use descriptor::{build_service, MethodDescriptor, ServiceDescriptor};
pub use error::{
    DispatchError, ErrorCategory, ErrorDetail, ErrorEnvelope, RegistrationError, ServiceError,
    ServiceResult,
};
pub use executor::{decode_request, encode_response, execute};
pub use invoker::{BoxFuture, Invoker, InvokerKind};
pub use service::{MethodEntry, Service};
pub use signature::{validate, MethodShape, MethodSignature, Receiver, TypeTag};
