//! In-memory test client.

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use sextant_server::Server;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Sends requests straight into [`Server::dispatch`], without binding a
/// port.
///
/// Requests pass through the same routing, request-id handling, timeout and
/// error policy as requests arriving over TCP.
///
/// # Example
///
/// ```ignore
/// use sextant_test::TestClient;
///
/// let mut server = Server::builder().build();
/// server.register(JobsApi::default())?;
///
/// let client = TestClient::new(server);
/// let response = client.get("/JobsApi/list").send().await;
/// response.assert_status(StatusCode::OK);
/// ```
#[must_use]
#[derive(Clone)]
pub struct TestClient {
    server: Arc<Server>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client over `server`.
    pub fn new(server: Server) -> Self {
        Self::from_arc(Arc::new(server))
    }

    /// Creates a client over a shared server.
    pub fn from_arc(server: Arc<Server>) -> Self {
        Self {
            server,
            default_headers: Vec::new(),
        }
    }

    /// The server under test.
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    async fn send_internal(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let response = self.server.dispatch(request.into_http_request()).await;
        TestResponse::from_http(response).await
    }
}

/// A request bound to a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut builder: TestRequestBuilder) -> Self {
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        Self { client, builder }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets `content-type`.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request. Panics if the request cannot be built.
    pub async fn send(self) -> TestResponse {
        let request = self.builder.build().expect("valid request");
        self.client
            .send_internal(request)
            .await
            .expect("request should succeed")
    }

    /// Sends the request, returning build or read failures.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.send_internal(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use sextant_core::{Context, ServiceDescriptor, ServiceError};
    use sextant_macros::service;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Greeting {
        name: String,
    }

    struct Greeter;

    #[service]
    impl Greeter {
        pub fn hello(&self, _ctx: &Context, greeting: Greeting) -> Result<Greeting, ServiceError> {
            if greeting.name == "nobody" {
                return Err(ServiceError::not_found("nobody is not here"));
            }
            Ok(Greeting {
                name: format!("hello {}", greeting.name),
            })
        }

        pub fn trace(&self, ctx: &Context) -> Result<String, ServiceError> {
            Ok(ctx.header("x-tenant").unwrap_or("none").to_string())
        }
    }

    fn client() -> TestClient {
        let mut greeter = ServiceDescriptor::build(Greeter).unwrap();
        greeter.post("/hello", "hello").unwrap();

        let mut server = Server::builder().build();
        server.bind(&greeter, "/greeter").unwrap();
        TestClient::new(server)
    }

    #[tokio::test]
    async fn test_json_exchange() {
        let response = client()
            .post("/greeter/hello")
            .json(&json!({"name": "ada"}))
            .send()
            .await;

        response
            .assert_status(StatusCode::OK)
            .assert_header("content-type", "application/json")
            .assert_json_eq(&json!({"name": "hello ada"}));
        assert!(response.body().ends_with(b"\n"));
        assert!(response.request_id().is_some());
    }

    #[tokio::test]
    async fn test_service_error_envelope() {
        let response = client()
            .post("/greeter/hello")
            .json(&json!({"name": "nobody"}))
            .send()
            .await;

        response
            .assert_status(StatusCode::NOT_FOUND)
            .assert_error_code("NOT_FOUND");
    }

    #[tokio::test]
    async fn test_default_headers_reach_context() {
        let client = client().with_default_header("x-tenant", "acme");
        let response = client.get("/greeter/trace").send().await;

        let tenant: String = response.json().unwrap();
        assert_eq!(tenant, "acme");
    }

    #[tokio::test]
    async fn test_unrouted_request() {
        let client = client();
        client
            .get("/missing")
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
        client
            .request(Method::PUT, "/greeter/hello")
            .send()
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED)
            .assert_header("allow", "POST");
    }

    #[tokio::test]
    async fn test_try_send_reports_build_errors() {
        let result = client()
            .get("/greeter/trace")
            .header("bad header", "x")
            .try_send()
            .await;
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }
}
