//! Procedural macros for Sextant services.
//!
//! # Overview
//!
//! The `#[service]` attribute goes on an inherent `impl` block. It leaves the
//! block untouched and adds an implementation of `sextant_core::Service`
//! whose method table describes every `pub` method that takes a receiver:
//! the receiver kind, a type tag per parameter and return value, and a bound
//! invoker when the method has one of the four callable shapes.
//!
//! Whether a method actually follows the calling convention is decided at
//! startup by `ServiceDescriptor::build`, which reports the first rule a
//! method breaks. The macro itself never rejects a method.
//!
//! # Example
//!
//! ```rust,ignore
//! use sextant::prelude::*;
//!
//! #[derive(Default)]
//! struct JobsApi {
//!     jobs: parking_lot::RwLock<Vec<Job>>,
//! }
//!
//! #[sextant::service]
//! impl JobsApi {
//!     pub fn list(&self, _ctx: &Context) -> Result<JobsList, ServiceError> {
//!         Ok(JobsList { jobs: self.jobs.read().clone() })
//!     }
//!
//!     pub async fn create(&self, _ctx: &Context, job: Job) -> Result<Job, ServiceError> {
//!         self.jobs.write().push(job.clone());
//!         Ok(job)
//!     }
//! }
//! ```
//!
//! # Generated Code
//!
//! Approximately:
//!
//! ```rust,ignore
//! impl ::sextant::core::Service for JobsApi {
//!     const NAME: &'static str = "JobsApi";
//!
//!     fn methods() -> Vec<MethodEntry<Self>> {
//!         vec![
//!             MethodEntry::new(
//!                 MethodSignature::new("list", Receiver::Shared,
//!                     vec![TypeTag::Context],
//!                     vec![TypeTag::Payload("JobsList"), TypeTag::Error("ServiceError")],
//!                     false),
//!                 Some(Invoker::reply(|svc: Arc<Self>, ctx: Context| async move {
//!                     svc.list(&ctx)
//!                 })),
//!             ),
//!             // create ...
//!         ]
//!     }
//! }
//! ```

mod parse;
mod service;

use proc_macro::TokenStream;

/// Exposes the public methods of an inherent `impl` block as a Sextant
/// service.
///
/// # Attributes
///
/// - `name`: service name override (defaults to the self type's name). The
///   name is also the default mount path, `/<name>`.
///
/// # Method shapes
///
/// Public methods with a receiver are recorded. Callable ones look like:
///
/// - `fn m(&self, ctx: &Context) -> Result<(), E>`
/// - `fn m(&self, ctx: &Context) -> Result<Res, E>`
/// - `fn m(&self, ctx: &Context, req: Req) -> Result<(), E>`
/// - `fn m(&self, ctx: &Context, req: Req) -> Result<Res, E>`
///
/// Any of them may be `async`. `Req` must implement `DeserializeOwned +
/// Serialize + Default`, `Res` must implement `Serialize`, and `E` must convert into
/// `anyhow::Error`. Private methods and associated functions are ignored.
///
/// Types are recognised by path, not resolved. `&Context` counts as the
/// context only when written unqualified or as `sextant::Context`,
/// `sextant::core::Context`, `sextant::prelude::Context` or
/// `sextant_core::Context`. A return type counts as a result only when it is
/// named `Result` (any module, e.g. `anyhow::Result<T>`) or `ServiceResult`.
#[proc_macro_attribute]
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    service::expand_service(attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
