//! HTTP server.
//!
//! Hyper HTTP/1.1 on Tokio. Each accepted connection runs in its own task.
//! Each request goes through these steps:
//!
//! 1. Body collection, bounded by `max_body_bytes` (413) and
//!    `request_timeout` (408).
//! 2. Routing on method + path (404, or 405 with an `Allow` header).
//! 3. Endpoint execution against a fresh [`Context`], bounded by
//!    `request_timeout` (504).
//! 4. Response assembly from the context, or from the [`ErrorPolicy`] when
//!    execution failed.
//!
//! [`Server::dispatch`] runs steps 2 to 4 on an in-memory request, which is
//! what `sextant-test` drives.
//!
//! # Example
//!
//! ```rust,no_run
//! use sextant_server::{Server, ServerError};
//!
//! # async fn run() -> Result<(), ServerError> {
//! let server = Server::builder().http_addr("127.0.0.1:8080").build();
//! server.run().await
//! # }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::ALLOW;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use sextant_core::{
    build_service, BindError, Context, ErrorCategory, RegistrationError, RequestId, ResponseParts,
    Service, ServiceDescriptor,
};
use sextant_telemetry::metrics::{record_dispatch, record_registration_failure, InFlightGuard};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::policy::{error_response, ErrorInfo, ErrorPolicy, JsonErrorPolicy};
use crate::router::Router;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Response body type.
pub type ResponseBody = Full<Bytes>;

/// Response type produced by the server.
pub type HttpResponse = Response<ResponseBody>;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
    router: Router,
    policy: Arc<dyn ErrorPolicy>,
}

impl Server {
    /// Creates a server with the default error policy.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            policy: Arc::new(JsonErrorPolicy),
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Mutable access to the router, for binding endpoints by hand.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Binds every method of `service` under its default path (`/` + name).
    pub fn mount<S>(&mut self, service: &ServiceDescriptor<S>) -> Result<&mut Self, BindError>
    where
        S: Send + Sync + 'static,
    {
        service.mount(&mut self.router)?;
        tracing::info!(
            service = service.name(),
            path = service.path(),
            methods = service.len(),
            "service mounted"
        );
        Ok(self)
    }

    /// Binds every method of `service` under `mount`.
    pub fn bind<S>(
        &mut self,
        service: &ServiceDescriptor<S>,
        mount: &str,
    ) -> Result<&mut Self, BindError>
    where
        S: Send + Sync + 'static,
    {
        service.bind_routes(mount, &mut self.router)?;
        tracing::info!(
            service = service.name(),
            path = mount,
            methods = service.len(),
            "service mounted"
        );
        Ok(self)
    }

    /// Builds a descriptor for `service` and mounts it with default routes.
    ///
    /// Registration failures are counted in
    /// `sextant_registration_failures_total` before being returned.
    pub fn register<S: Service>(&mut self, service: S) -> Result<&mut Self, ServerError> {
        let descriptor = build_service(service).map_err(|err| {
            record_registration_failure(S::NAME, err.reason());
            err
        })?;
        self.mount(&descriptor)?;
        Ok(self)
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!(
                "invalid address '{}': {e}",
                self.config.http_addr()
            ))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind to {addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// triggers, then waits up to `shutdown_timeout` for open connections.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, routes = self.router.route_count(), "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                    tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            connections = tracker.active_connections(),
            "waiting for connections to close"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    connections = tracker.active_connections(),
                    "shutdown timeout reached with connections still open"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(remote = %remote_addr, "closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        }
    }

    async fn handle_request(&self, req: Request<Incoming>) -> Result<HttpResponse, Infallible> {
        let (parts, body) = req.into_parts();
        let limited = Limited::new(body, self.config.max_body_bytes());

        let collected =
            tokio::time::timeout(self.config.request_timeout(), limited.collect()).await;

        let body = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Ok(self.payload_too_large());
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, path = parts.uri.path(), "failed to read request body");
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    ErrorCategory::Validation,
                    "failed to read request body",
                    None,
                ));
            }
            Err(_) => {
                tracing::warn!(path = parts.uri.path(), "request body collection timed out");
                return Ok(error_response(
                    StatusCode::REQUEST_TIMEOUT,
                    ErrorCategory::Validation,
                    "request body collection timed out",
                    None,
                ));
            }
        };

        Ok(self.dispatch(Request::from_parts(parts, body)).await)
    }

    /// Routes and executes one fully buffered request.
    pub async fn dispatch(&self, request: Request<Bytes>) -> HttpResponse {
        let started = Instant::now();
        let (parts, body) = request.into_parts();

        if body.len() > self.config.max_body_bytes() {
            return self.payload_too_large();
        }

        let request_id = parts
            .headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();

        let path = parts.uri.path().to_string();
        let Some(found) = self.router.match_route(&parts.method, &path) else {
            let mut response = self.unrouted(&parts.method, &path, request_id);
            set_request_id(&mut response, request_id);
            return response;
        };
        let (endpoint, params) = found.into_parts();

        tracing::info!(
            request_id = %request_id,
            http.method = %parts.method,
            http.path = %path,
            service = endpoint.service(),
            method = endpoint.method(),
            "request started"
        );

        let ctx = Context::builder()
            .method(parts.method)
            .uri(parts.uri)
            .headers(parts.headers)
            .params(params)
            .body(body)
            .request_id(request_id)
            .build();

        let outcome = {
            let _in_flight = InFlightGuard::new();
            tokio::time::timeout(self.config.request_timeout(), endpoint.call(ctx.clone())).await
        };

        let mut response = match outcome {
            Ok(Ok(())) => into_http(ctx.into_response_parts()),
            Ok(Err(err)) => {
                let info = ErrorInfo {
                    service: endpoint.service(),
                    method: endpoint.method(),
                    request_id,
                };
                self.policy.respond(&err, &info)
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    service = endpoint.service(),
                    method = endpoint.method(),
                    "handler execution timed out"
                );
                error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    ErrorCategory::Unavailable,
                    "handler execution timed out",
                    Some(request_id),
                )
            }
        };
        set_request_id(&mut response, request_id);

        let elapsed = started.elapsed();
        let status = response.status().as_u16();
        record_dispatch(endpoint.service(), endpoint.method(), status, elapsed);
        tracing::info!(
            request_id = %request_id,
            http.status_code = status,
            duration_ms = duration_ms(elapsed),
            "request completed"
        );

        response
    }

    fn unrouted(&self, method: &http::Method, path: &str, request_id: RequestId) -> HttpResponse {
        let allowed = self.router.allowed_methods(path);
        if allowed.is_empty() {
            tracing::debug!(http.method = %method, http.path = path, "no route");
            return error_response(
                StatusCode::NOT_FOUND,
                ErrorCategory::NotFound,
                format!("no route for {path}"),
                Some(request_id),
            );
        }

        tracing::debug!(http.method = %method, http.path = path, "method not allowed");
        let allow = allowed
            .iter()
            .map(http::Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorCategory::Validation,
            format!("{method} is not allowed for {path}"),
            Some(request_id),
        );
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(ALLOW, value);
        }
        response
    }

    fn payload_too_large(&self) -> HttpResponse {
        error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCategory::Validation,
            format!(
                "request body exceeds {} bytes",
                self.config.max_body_bytes()
            ),
            None,
        )
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("routes", &self.router.route_count())
            .finish_non_exhaustive()
    }
}

fn into_http(parts: ResponseParts) -> HttpResponse {
    let mut response = Response::new(Full::new(parts.body));
    *response.status_mut() = parts.status;
    *response.headers_mut() = parts.headers;
    response
}

fn set_request_id(response: &mut HttpResponse, request_id: RequestId) {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    config_builder: ServerConfigBuilder,
    config: Option<ServerConfig>,
    policy: Option<Arc<dyn ErrorPolicy>>,
}

impl ServerBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a complete configuration, ignoring the individual setters.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the listen address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.http_addr(addr);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.request_timeout(timeout);
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.shutdown_timeout(timeout);
        self
    }

    /// Sets the request body limit.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config_builder = self.config_builder.max_body_bytes(limit);
        self
    }

    /// Replaces the default [`JsonErrorPolicy`].
    #[must_use]
    pub fn error_policy(mut self, policy: impl ErrorPolicy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self
                .config
                .unwrap_or_else(|| self.config_builder.build()),
            router: Router::new(),
            policy: self.policy.unwrap_or_else(|| Arc::new(JsonErrorPolicy)),
        }
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Errors from setting up or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address was invalid or could not be bound.
    #[error("Bind error: {0}")]
    Bind(String),

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A service failed signature validation.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A route could not be added.
    #[error(transparent)]
    Route(#[from] BindError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::Method;
    use sextant_core::{BoxFuture, Endpoint, ServiceError, Verb};

    fn endpoint<F>(method: &str, f: F) -> Endpoint
    where
        F: Fn(Context) -> Result<(), sextant_core::DispatchError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Endpoint::new("Test", method.to_string(), move |ctx: Context| {
            let f = Arc::clone(&f);
            Box::pin(async move { f(ctx) }) as BoxFuture<_>
        })
    }

    async fn body_text(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(method: Method, path: &str, body: &'static str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_success_uses_context_response() {
        let mut server = Server::builder().build();
        server
            .router_mut()
            .add_route(
                Verb::Post,
                "/echo/{id}",
                endpoint("echo", |ctx| {
                    let body = ctx.take_body().unwrap_or_default();
                    ctx.set_status(StatusCode::CREATED);
                    ctx.write(ctx.param("id").unwrap_or("?"));
                    ctx.write(body);
                    Ok(())
                }),
            )
            .unwrap();

        let response = server
            .dispatch(request(Method::POST, "/echo/7", ":hello"))
            .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_text(response).await, "7:hello");
    }

    #[tokio::test]
    async fn test_dispatch_error_replaces_partial_body() {
        let mut server = Server::new(ServerConfig::default());
        server
            .router_mut()
            .add_route(
                Verb::Get,
                "/fail",
                endpoint("fail", |ctx| {
                    ctx.write("partial");
                    Err(sextant_core::DispatchError::method(ServiceError::conflict(
                        "taken",
                    )))
                }),
            )
            .unwrap();

        let response = server.dispatch(request(Method::GET, "/fail", "")).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let text = body_text(response).await;
        assert!(!text.contains("partial"));
        assert!(text.contains("CONFLICT"));
    }

    #[tokio::test]
    async fn test_not_found_and_method_not_allowed() {
        let mut server = Server::builder().build();
        server
            .router_mut()
            .add_route(Verb::Get, "/jobs", endpoint("list", |_| Ok(())))
            .unwrap();

        let response = server.dispatch(request(Method::GET, "/missing", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server.dispatch(request(Method::DELETE, "/jobs", "")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let mut server = Server::builder().build();
        server
            .router_mut()
            .add_route(
                Verb::Get,
                "/id",
                endpoint("id", |ctx| {
                    ctx.write(ctx.request_id().to_string());
                    Ok(())
                }),
            )
            .unwrap();

        let id = RequestId::new();
        let req = Request::builder()
            .uri("/id")
            .header(REQUEST_ID_HEADER, id.to_string())
            .body(Bytes::new())
            .unwrap();
        let response = server.dispatch(req).await;

        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            id.to_string().as_str()
        );
        assert_eq!(body_text(response).await, id.to_string());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut server = Server::builder().max_body_bytes(4).build();
        server
            .router_mut()
            .add_route(Verb::Post, "/jobs", endpoint("create", |_| Ok(())))
            .unwrap();

        let response = server
            .dispatch(request(Method::POST, "/jobs", "too long"))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_handler_timeout() {
        let mut server = Server::builder()
            .request_timeout(Duration::from_millis(20))
            .build();
        server
            .router_mut()
            .add_route(
                Verb::Get,
                "/slow",
                Endpoint::new("Test", "slow", |_ctx: Context| {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(())
                    }) as BoxFuture<_>
                }),
            )
            .unwrap();

        let response = server.dispatch(request(Method::GET, "/slow", "")).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind("port in use".to_string());
        assert_eq!(err.to_string(), "Bind error: port in use");

        let err = ServerError::from(BindError::Conflict {
            verb: Verb::Get,
            path: "/jobs".to_string(),
        });
        assert!(err.to_string().contains("GET /jobs"));
    }
}
