//! Error types for Sextant.
//!
//! Three families of errors show up at different times:
//!
//! - [`RegistrationError`]: a service's method table breaks the calling
//!   convention. Raised once, while building a [`ServiceDescriptor`](crate::ServiceDescriptor).
//! - [`DispatchError`]: one execution failed to decode, run, or encode.
//! - [`ServiceError`]: what application methods return to pick an HTTP
//!   status and a client-facing message.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ServiceError`].
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A method table entry that does not follow the calling convention.
///
/// Every message names the service and the method so the offending
/// declaration is easy to find.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The method returns neither `Result<(), E>` nor `Result<T, E>`.
    #[error("invalid number of return values for {service}.{method}: {count} (expected 1 or 2)")]
    ReturnArity {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// Number of return values found.
        count: usize,
    },

    /// The last return value is not an error.
    #[error("{service}.{method} should return an error as its last value, found {found}")]
    MissingErrorReturn {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// The type found in the error position.
        found: String,
    },

    /// Wrong number of parameters after the receiver.
    #[error(
        "invalid number of arguments for {service}.{method}: {count} (expected a context and at most one request)"
    )]
    ParamArity {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// Number of parameters found, receiver excluded.
        count: usize,
    },

    /// The first parameter is not `&Context`.
    #[error("{service}.{method} should take &Context as its first argument, found {found}")]
    MissingContext {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// The type found in the first position.
        found: String,
    },

    /// The request parameter is borrowed or otherwise not decodable.
    #[error("{service}.{method} should take its request by value, found {found}")]
    RequestNotOwned {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// The declared request type.
        found: String,
    },

    /// The response value is borrowed or otherwise not encodable.
    #[error("{service}.{method} should return its response by value, found {found}")]
    ResponseNotOwned {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// The declared response type.
        found: String,
    },

    /// The method takes `&mut self` or `self`.
    #[error("{service}.{method} must take &self, found {receiver}")]
    ExclusiveReceiver {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
        /// The declared receiver.
        receiver: String,
    },

    /// The method validated but no callable was bound for it.
    #[error("{service}.{method} has a valid signature but no matching invoker")]
    NotInvocable {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
    },

    /// Two table entries share a name.
    #[error("{service}.{method} is declared more than once")]
    DuplicateMethod {
        /// Service type name.
        service: String,
        /// Method name.
        method: String,
    },

    /// A route was requested for a method the service does not have.
    #[error("no such method: {service}.{method}")]
    UnknownMethod {
        /// Service type name.
        service: String,
        /// Requested method name.
        method: String,
    },
}

impl RegistrationError {
    /// Name of the method the error is about.
    pub fn method(&self) -> &str {
        match self {
            Self::ReturnArity { method, .. }
            | Self::MissingErrorReturn { method, .. }
            | Self::ParamArity { method, .. }
            | Self::MissingContext { method, .. }
            | Self::RequestNotOwned { method, .. }
            | Self::ResponseNotOwned { method, .. }
            | Self::ExclusiveReceiver { method, .. }
            | Self::NotInvocable { method, .. }
            | Self::DuplicateMethod { method, .. }
            | Self::UnknownMethod { method, .. } => method,
        }
    }

    /// Short snake_case label for the broken rule, suitable as a metric label.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::ReturnArity { .. } => "return_arity",
            Self::MissingErrorReturn { .. } => "missing_error_return",
            Self::ParamArity { .. } => "param_arity",
            Self::MissingContext { .. } => "missing_context",
            Self::RequestNotOwned { .. } => "request_not_owned",
            Self::ResponseNotOwned { .. } => "response_not_owned",
            Self::ExclusiveReceiver { .. } => "exclusive_receiver",
            Self::NotInvocable { .. } => "not_invocable",
            Self::DuplicateMethod { .. } => "duplicate_method",
            Self::UnknownMethod { .. } => "unknown_method",
        }
    }
}

/// Failure of one method execution.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body was not valid JSON for the request type. The method
    /// was not invoked.
    #[error("failed to decode request: {0}")]
    Decode(#[source] serde_json::Error),

    /// The method returned an error.
    #[error(transparent)]
    Method(anyhow::Error),

    /// The method's response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl DispatchError {
    /// Wraps an application error.
    pub fn method(error: impl Into<anyhow::Error>) -> Self {
        Self::Method(error.into())
    }

    /// Returns the [`ServiceError`] carried by a method failure, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Method(error) => error.downcast_ref::<ServiceError>(),
            _ => None,
        }
    }

    /// Classifies the failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Decode(_) => ErrorCategory::Validation,
            Self::Encode(_) => ErrorCategory::Internal,
            Self::Method(_) => self
                .service_error()
                .map_or(ErrorCategory::Internal, ServiceError::category),
        }
    }

    /// HTTP status for this failure.
    pub fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }
}

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid input.
    Validation,
    /// Resource not found.
    NotFound,
    /// Conflicting state, such as a duplicate create.
    Conflict,
    /// A dependency is temporarily unavailable.
    Unavailable,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code used in error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Application-facing error for service methods.
///
/// # Example
///
/// ```
/// use sextant_core::{ErrorCategory, ServiceError};
///
/// fn find(id: u64) -> Result<(), ServiceError> {
///     Err(ServiceError::not_found(format!("job {id} not found")))
/// }
///
/// let err = find(7).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert_eq!(err.status_code().as_u16(), 404);
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Conflicting state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// A dependency is unavailable.
    #[error("Unavailable: {message}")]
    Unavailable {
        /// Human-readable error message.
        message: String,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ServiceError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Unavailable { .. } => ErrorCategory::Unavailable,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope::new(self.category(), self.to_string(), request_id)
    }
}

/// JSON error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error detail.
    pub error: ErrorDetail,
    /// Request identifier, for correlation with server logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    /// Builds an envelope from a category and message.
    pub fn new(
        category: ErrorCategory,
        message: impl Into<String>,
        request_id: Option<&str>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: category.code().to_string(),
                message: message.into(),
                category,
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Body of an [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_status_codes() {
        assert_eq!(
            ErrorCategory::Validation.default_status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCategory::NotFound.default_status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCategory::Conflict.default_status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCategory::Unavailable.default_status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCategory::Internal.default_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_registration_error_names_service_and_method() {
        let err = RegistrationError::MissingContext {
            service: "JobsApi".to_string(),
            method: "list_fail".to_string(),
            found: "JobReq".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("JobsApi.list_fail"));
        assert!(message.contains("JobReq"));
        assert_eq!(err.method(), "list_fail");
        assert_eq!(err.reason(), "missing_context");
    }

    #[test]
    fn test_dispatch_error_category_from_service_error() {
        let err = DispatchError::method(ServiceError::conflict("job exists"));
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.service_error().is_some());
    }

    #[test]
    fn test_dispatch_error_category_from_foreign_error() {
        let err = DispatchError::method(std::io::Error::other("disk full"));
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert!(err.service_error().is_none());
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_decode_error_is_validation() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = DispatchError::Decode(json_err);
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().starts_with("failed to decode request"));
    }

    #[test]
    fn test_envelope_serialization() {
        let err = ServiceError::not_found("job 7 not found");
        let envelope = err.to_envelope(Some("req-1"));
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["category"], "not_found");
        assert_eq!(json["error"]["message"], "Not found: job 7 not found");
        assert_eq!(json["request_id"], "req-1");
    }

    #[test]
    fn test_envelope_without_request_id() {
        let envelope = ServiceError::internal("boom").to_envelope(None);
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn test_internal_with_source() {
        let err = ServiceError::internal_with_source("store failed", std::io::Error::other("io"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
