//! Mapping dispatch failures to HTTP responses.
//!
//! The server hands every [`DispatchError`] to an [`ErrorPolicy`]. Whatever
//! the method had written to its context is discarded; the policy's response
//! replaces it wholesale.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use sextant_core::{DispatchError, ErrorCategory, ErrorEnvelope, RequestId};

use crate::server::HttpResponse;

/// Where a failure happened.
#[derive(Debug, Clone, Copy)]
pub struct ErrorInfo<'a> {
    /// Service name.
    pub service: &'a str,
    /// Method name.
    pub method: &'a str,
    /// Request being served.
    pub request_id: RequestId,
}

/// Turns a failed dispatch into a response.
pub trait ErrorPolicy: Send + Sync {
    /// Builds the response for `err`.
    fn respond(&self, err: &DispatchError, info: &ErrorInfo<'_>) -> HttpResponse;
}

/// Default policy: JSON error envelope with the status of the error's
/// category.
///
/// | Failure | Status |
/// |---------|--------|
/// | decode | 400 |
/// | encode | 500 |
/// | method returning [`ServiceError`](sextant_core::ServiceError) | its category's status |
/// | any other method error | 500 |
///
/// Messages of errors that are not a `ServiceError` stay in the server log
/// and never reach the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorPolicy;

impl ErrorPolicy for JsonErrorPolicy {
    fn respond(&self, err: &DispatchError, info: &ErrorInfo<'_>) -> HttpResponse {
        let request_id = info.request_id.to_string();
        let envelope = match err {
            DispatchError::Decode(e) => ErrorEnvelope::new(
                ErrorCategory::Validation,
                format!("invalid request body: {e}"),
                Some(&request_id),
            ),
            DispatchError::Encode(_) => ErrorEnvelope::new(
                ErrorCategory::Internal,
                "failed to encode response",
                Some(&request_id),
            ),
            DispatchError::Method(_) => match err.service_error() {
                Some(service_error) => service_error.to_envelope(Some(&request_id)),
                None => ErrorEnvelope::new(
                    ErrorCategory::Internal,
                    "internal error",
                    Some(&request_id),
                ),
            },
        };

        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(
                service = info.service,
                method = info.method,
                request_id = %info.request_id,
                error = %err,
                "dispatch failed"
            );
        } else {
            tracing::warn!(
                service = info.service,
                method = info.method,
                request_id = %info.request_id,
                error = %err,
                "dispatch rejected"
            );
        }

        envelope_response(status, &envelope)
    }
}

/// Panics with the error instead of answering.
///
/// The panic unwinds the connection task, so the client sees the connection
/// close without a response. Other connections are unaffected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicPolicy;

impl ErrorPolicy for PanicPolicy {
    fn respond(&self, err: &DispatchError, info: &ErrorInfo<'_>) -> HttpResponse {
        tracing::error!(
            service = info.service,
            method = info.method,
            request_id = %info.request_id,
            error = %err,
            "dispatch failed, aborting request"
        );
        panic!("{}.{} failed: {err}", info.service, info.method);
    }
}

/// Serializes `envelope` as a JSON response with `status`.
pub fn envelope_response(status: StatusCode, envelope: &ErrorEnvelope) -> HttpResponse {
    let body = serde_json::to_vec(envelope).unwrap_or_else(|_| {
        br#"{"error":{"code":"INTERNAL_ERROR","message":"internal error","category":"internal"}}"#
            .to_vec()
    });

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// JSON error response for failures raised by the server itself (routing,
/// body limits, timeouts).
pub fn error_response(
    status: StatusCode,
    category: ErrorCategory,
    message: impl Into<String>,
    request_id: Option<RequestId>,
) -> HttpResponse {
    let request_id = request_id.map(|id| id.to_string());
    let envelope = ErrorEnvelope::new(category, message, request_id.as_deref());
    envelope_response(status, &envelope)
}
