//! Per-request context capability.
//!
//! A [`Context`] is handed to every service method. It exposes the inbound
//! request read-only and lets the method shape the outbound response
//! (status, headers, body). Clones share the same underlying request.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request easy to
/// correlate.
///
/// # Example
///
/// ```
/// use sextant_core::RequestId;
///
/// let id = RequestId::new();
/// assert_ne!(id, RequestId::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses a request ID propagated by a caller (for example an
    /// `x-request-id` header).
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Path parameters extracted by the router, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter. A later value for the same name shadows earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameters were captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug)]
struct RequestParts {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Params,
    request_id: RequestId,
}

#[derive(Debug, Default)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

#[derive(Debug)]
struct Inner {
    request: RequestParts,
    body: Mutex<Option<Bytes>>,
    response: Mutex<ResponseState>,
}

/// The response a method built up through its [`Context`].
#[derive(Debug, Default)]
pub struct ResponseParts {
    /// Status code, 200 unless the method changed it.
    pub status: StatusCode,
    /// Headers set by the method and the executor.
    pub headers: HeaderMap,
    /// Everything written to the response body.
    pub body: Bytes,
}

/// Per-request capability passed to every service method as `&Context`.
///
/// Request data is immutable. Response data sits behind a mutex so methods
/// and the executor can write through a shared reference. Cloning is cheap
/// and every clone refers to the same request.
///
/// # Example
///
/// ```
/// use sextant_core::Context;
/// use http::{Method, StatusCode};
///
/// let ctx = Context::builder()
///     .method(Method::POST)
///     .uri("/jobs/create")
///     .body(r#"{"name":"build"}"#)
///     .build();
///
/// assert_eq!(ctx.path(), "/jobs/create");
/// ctx.set_status(StatusCode::CREATED);
/// ctx.write(b"ok");
///
/// let parts = ctx.into_response_parts();
/// assert_eq!(parts.status, StatusCode::CREATED);
/// assert_eq!(&parts.body[..], b"ok");
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Starts building a context.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.inner.request.method
    }

    /// Full request URI.
    pub fn uri(&self) -> &Uri {
        &self.inner.request.uri
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        self.inner.request.uri.path()
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.request.headers
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .request
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// Path parameters captured by the router.
    pub fn params(&self) -> &Params {
        &self.inner.request.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.request.params.get(name)
    }

    /// Identifier of this request.
    pub fn request_id(&self) -> RequestId {
        self.inner.request.request_id
    }

    /// Returns a copy of the request body if it has not been taken.
    pub fn body(&self) -> Option<Bytes> {
        self.inner.body.lock().clone()
    }

    /// Takes the request body, leaving `None` behind.
    ///
    /// The executor takes the body before decoding a request payload, so a
    /// method that declares a request sees `None` here.
    pub fn take_body(&self) -> Option<Bytes> {
        self.inner.body.lock().take()
    }

    /// Current response status.
    pub fn status(&self) -> StatusCode {
        self.inner.response.lock().status
    }

    /// Sets the response status.
    pub fn set_status(&self, status: StatusCode) {
        self.inner.response.lock().status = status;
    }

    /// Sets a response header, replacing any existing values.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response.lock().headers.insert(name, value);
    }

    /// Appends a response header value.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response.lock().headers.append(name, value);
    }

    /// Snapshot of the response headers set so far.
    pub fn response_headers(&self) -> HeaderMap {
        self.inner.response.lock().headers.clone()
    }

    /// Appends bytes to the response body.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        self.inner
            .response
            .lock()
            .body
            .extend_from_slice(data.as_ref());
    }

    /// Number of response body bytes written so far.
    pub fn written(&self) -> usize {
        self.inner.response.lock().body.len()
    }

    /// Moves the accumulated response out of the context.
    ///
    /// Other clones observe a fresh 200 response with no headers or body
    /// afterwards.
    pub fn into_response_parts(self) -> ResponseParts {
        let state = std::mem::take(&mut *self.inner.response.lock());
        ResponseParts {
            status: state.status,
            headers: state.headers,
            body: state.body.freeze(),
        }
    }
}

/// Builder for [`Context`].
#[derive(Debug, Default)]
#[must_use]
pub struct ContextBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Params,
    body: Option<Bytes>,
    request_id: Option<RequestId>,
}

impl ContextBuilder {
    /// Sets the HTTP method (defaults to GET).
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the URI. Unparseable input leaves the current URI in place.
    pub fn uri<T>(mut self, uri: T) -> Self
    where
        Uri: TryFrom<T>,
    {
        if let Ok(uri) = Uri::try_from(uri) {
            self.uri = uri;
        }
        self
    }

    /// Replaces the request headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Adds one request header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the router-captured path parameters.
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the request body. An empty body is stored as absent.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    /// Uses a caller-supplied request ID instead of generating one.
    pub fn request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Builds the context.
    pub fn build(self) -> Context {
        Context {
            inner: Arc::new(Inner {
                request: RequestParts {
                    method: self.method,
                    uri: self.uri,
                    headers: self.headers,
                    params: self.params,
                    request_id: self.request_id.unwrap_or_default(),
                },
                body: Mutex::new(self.body),
                response: Mutex::new(ResponseState::default()),
            }),
        }
    }
}
