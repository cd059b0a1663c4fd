//! Method signatures and the calling-convention validator.
//!
//! `#[service]` records every public method as a [`MethodSignature`]: the
//! receiver plus one [`TypeTag`] per parameter and per return value. The
//! validator decides, once per method, whether that shape is callable and
//! what the dispatcher must do for it (decode a body, encode a response).

use crate::error::RegistrationError;
use std::fmt;

/// Introspected classification of one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `&Context`.
    Context,
    /// An owned value type.
    Payload(&'static str),
    /// The error half of a `Result`.
    Error(&'static str),
    /// Any other borrowed type, e.g. `&Job` or `&mut Context`.
    Reference(&'static str),
    /// A type the macro could not classify.
    Other(&'static str),
}

impl TypeTag {
    /// Shorthand for [`TypeTag::Payload`].
    pub const fn payload(name: &'static str) -> Self {
        Self::Payload(name)
    }

    /// Shorthand for [`TypeTag::Error`].
    pub const fn error(name: &'static str) -> Self {
        Self::Error(name)
    }

    /// Shorthand for [`TypeTag::Reference`].
    pub const fn reference(name: &'static str) -> Self {
        Self::Reference(name)
    }

    /// Returns `true` for [`TypeTag::Context`].
    pub const fn is_context(&self) -> bool {
        matches!(self, Self::Context)
    }

    /// Returns `true` for [`TypeTag::Error`].
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the payload type name for [`TypeTag::Payload`].
    pub const fn payload_name(&self) -> Option<&'static str> {
        match self {
            Self::Payload(name) => Some(*name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context => f.write_str("&Context"),
            Self::Payload(name) | Self::Error(name) | Self::Reference(name) | Self::Other(name) => {
                f.write_str(name)
            }
        }
    }
}

/// How a method takes `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// `&self`
    Shared,
    /// `&mut self`
    Exclusive,
    /// `self`, or a typed receiver such as `self: Arc<Self>`
    Owned,
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shared => "&self",
            Self::Exclusive => "&mut self",
            Self::Owned => "self",
        })
    }
}

/// Declared signature of one service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Method name.
    pub name: &'static str,
    /// Receiver kind.
    pub receiver: Receiver,
    /// Parameters after the receiver.
    pub params: Vec<TypeTag>,
    /// Return list, see [`TypeTag`].
    pub returns: Vec<TypeTag>,
    /// Whether the method is `async fn`.
    pub is_async: bool,
}

impl MethodSignature {
    /// Creates a signature.
    pub fn new(
        name: &'static str,
        receiver: Receiver,
        params: Vec<TypeTag>,
        returns: Vec<TypeTag>,
        is_async: bool,
    ) -> Self {
        Self {
            name,
            receiver,
            params,
            returns,
            is_async,
        }
    }
}

/// What a validated method needs from the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodShape {
    /// The method declares a request parameter; decode the body.
    pub consumes_body: bool,
    /// 1 for error-only methods, 2 for response + error.
    pub return_count: usize,
    /// Name of the request type, when `consumes_body`.
    pub request_type: Option<&'static str>,
    /// Name of the response type, when `return_count == 2`.
    pub response_type: Option<&'static str>,
}

/// Checks `signature` against the calling convention.
///
/// Rules are applied in a fixed order and the first violation is returned:
/// return arity, trailing error, parameter arity, context first, owned
/// request, owned response, shared receiver.
///
/// # Example
///
/// ```
/// use sextant_core::{validate, MethodSignature, Receiver, TypeTag};
///
/// let signature = MethodSignature::new(
///     "create",
///     Receiver::Shared,
///     vec![TypeTag::Context, TypeTag::payload("Job")],
///     vec![TypeTag::payload("Job"), TypeTag::error("ServiceError")],
///     false,
/// );
///
/// let shape = validate("JobsApi", &signature).unwrap();
/// assert!(shape.consumes_body);
/// assert_eq!(shape.return_count, 2);
/// ```
pub fn validate(
    service: &str,
    signature: &MethodSignature,
) -> Result<MethodShape, RegistrationError> {
    let service = service.to_string();
    let method = signature.name.to_string();

    let returns = &signature.returns;
    if !(1..=2).contains(&returns.len()) {
        return Err(RegistrationError::ReturnArity {
            service,
            method,
            count: returns.len(),
        });
    }

    let last = &returns[returns.len() - 1];
    if !last.is_error() {
        return Err(RegistrationError::MissingErrorReturn {
            service,
            method,
            found: last.to_string(),
        });
    }

    let params = &signature.params;
    if !(1..=2).contains(&params.len()) {
        return Err(RegistrationError::ParamArity {
            service,
            method,
            count: params.len(),
        });
    }

    if !params[0].is_context() {
        return Err(RegistrationError::MissingContext {
            service,
            method,
            found: params[0].to_string(),
        });
    }

    let request_type = match params.get(1) {
        None => None,
        Some(TypeTag::Payload(name)) => Some(*name),
        Some(other) => {
            return Err(RegistrationError::RequestNotOwned {
                service,
                method,
                found: other.to_string(),
            })
        }
    };

    let response_type = if returns.len() == 2 {
        match &returns[0] {
            TypeTag::Payload(name) => Some(*name),
            other => {
                return Err(RegistrationError::ResponseNotOwned {
                    service,
                    method,
                    found: other.to_string(),
                })
            }
        }
    } else {
        None
    };

    if signature.receiver != Receiver::Shared {
        return Err(RegistrationError::ExclusiveReceiver {
            service,
            method,
            receiver: signature.receiver.to_string(),
        });
    }

    Ok(MethodShape {
        consumes_body: request_type.is_some(),
        return_count: returns.len(),
        request_type,
        response_type,
    })
}
