//! Seam between descriptors and whatever router serves them.

use crate::context::Context;
use crate::error::DispatchError;
use crate::invoker::BoxFuture;
use http::Method;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// HTTP verbs a method can be routed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verb {
    /// GET, the default for every method.
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
}

impl Verb {
    /// Parses a verb name case-insensitively. Unrecognized names map to
    /// [`Verb::Get`].
    pub fn parse_lenient(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "POST" => Self::Post,
            "PUT" => Self::Put,
            _ => Self::Get,
        }
    }

    /// The matching [`http::Method`].
    pub fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
        }
    }

    /// Upper-case verb name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for Method {
    fn from(verb: Verb) -> Self {
        verb.as_method()
    }
}

type EndpointFn = dyn Fn(Context) -> BoxFuture<Result<(), DispatchError>> + Send + Sync;

/// Type-erased execution entry point for one bound method.
///
/// Cheap to clone. The service and method names travel with the callable so
/// routers can label logs, metrics and error responses.
#[derive(Clone)]
pub struct Endpoint {
    service: Arc<str>,
    method: Arc<str>,
    handler: Arc<EndpointFn>,
}

impl Endpoint {
    /// Wraps a callable.
    pub fn new<F>(service: impl Into<Arc<str>>, method: impl Into<Arc<str>>, handler: F) -> Self
    where
        F: Fn(Context) -> BoxFuture<Result<(), DispatchError>> + Send + Sync + 'static,
    {
        Self {
            service: service.into(),
            method: method.into(),
            handler: Arc::new(handler),
        }
    }

    /// Name of the service that owns the method.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Runs the method for one request.
    pub fn call(&self, ctx: Context) -> BoxFuture<Result<(), DispatchError>> {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("service", &self.service)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Errors a router reports while binding endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The verb and path are already bound.
    #[error("route conflict: {verb} {path} is already bound")]
    Conflict {
        /// Verb of the conflicting route.
        verb: Verb,
        /// Path of the conflicting route.
        path: String,
    },

    /// The router cannot accept the path.
    #[error("invalid route path {path:?}: {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Something that can register endpoints under a verb and path.
///
/// Implemented by `sextant-server`'s router; tests can implement it with a
/// plain `Vec`.
pub trait RouteBinder {
    /// Registers `endpoint` for `verb` at `path`.
    fn bind(&mut self, verb: Verb, path: &str, endpoint: Endpoint) -> Result<(), BindError>;
}

impl<T: RouteBinder + ?Sized> RouteBinder for &mut T {
    fn bind(&mut self, verb: Verb, path: &str, endpoint: Endpoint) -> Result<(), BindError> {
        (**self).bind(verb, path, endpoint)
    }
}

/// Joins a mount path and a method path with exactly one `/` at the seam.
///
/// The result always starts with `/`. A trailing `/` on `path` is kept.
///
/// # Example
///
/// ```
/// use sextant_core::join_path;
///
/// assert_eq!(join_path("/jobs", "/"), "/jobs/");
/// assert_eq!(join_path("/jobs/", "/list"), "/jobs/list");
/// assert_eq!(join_path("jobs", "list"), "/jobs/list");
/// assert_eq!(join_path("/", "list"), "/list");
/// assert_eq!(join_path("", ""), "/");
/// ```
pub fn join_path(mount: &str, path: &str) -> String {
    let mount = mount.trim_matches('/');
    let tail = path.trim_start_matches('/');

    let mut joined = String::with_capacity(mount.len() + tail.len() + 2);
    joined.push('/');
    joined.push_str(mount);
    if !mount.is_empty() && (!tail.is_empty() || path.ends_with('/')) {
        joined.push('/');
    }
    joined.push_str(tail);
    joined
}
