//! Test response wrapper.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use sextant_core::ErrorEnvelope;
use sextant_server::{HttpResponse, REQUEST_ID_HEADER};

use crate::error::TestError;

/// A fully buffered response with assertion helpers.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Buffers a server response.
    pub async fn from_http(response: HttpResponse) -> Result<Self, TestError> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Creates a response from parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response status as a number.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// One header.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// One header as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// `content-type`, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// `x-request-id` echoed by the server.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header_str(REQUEST_ID_HEADER.as_str())
    }

    /// Raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as an untyped JSON value. Panics on invalid JSON.
    #[must_use]
    pub fn json_value(&self) -> serde_json::Value {
        match self.json() {
            Ok(value) => value,
            Err(e) => panic!("Body should be valid JSON: {e}"),
        }
    }

    /// Body decoded as an error envelope.
    pub fn error_envelope(&self) -> Result<ErrorEnvelope, TestError> {
        self.json()
    }

    /// Asserts the status.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {} with body {:?}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts a 2xx status.
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.is_success(),
            "Expected success status, got {}",
            self.status
        );
        self
    }

    /// Asserts a header value.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected, "Header '{name}' mismatch");
        self
    }

    /// Asserts the body is empty.
    pub fn assert_empty_body(&self) -> &Self {
        assert!(
            self.body.is_empty(),
            "Expected empty body, got {:?}",
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts the body equals `expected` as JSON.
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        let actual = self.json_value();
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts the body is an error envelope with `code`.
    pub fn assert_error_code(&self, code: &str) -> &Self {
        let envelope = match self.error_envelope() {
            Ok(envelope) => envelope,
            Err(e) => panic!("Body should be an error envelope: {e}"),
        };
        assert_eq!(envelope.error.code, code, "Error code mismatch");
        self
    }
}
