//! The method-table contract between `#[service]` and the descriptor builder.

use crate::invoker::Invoker;
use crate::signature::MethodSignature;

/// A type whose public methods can be served.
///
/// Implemented by the `#[service]` attribute. Hand-written implementations
/// are fine too; they go through the same validation in
/// [`ServiceDescriptor::build`](crate::ServiceDescriptor::build).
pub trait Service: Send + Sync + Sized + 'static {
    /// Service name, used in error messages and as the default mount path.
    const NAME: &'static str;

    /// One entry per public method, in declaration order.
    fn methods() -> Vec<MethodEntry<Self>>;
}

/// One row of a service's method table.
#[derive(Debug, Clone)]
pub struct MethodEntry<S> {
    /// Declared signature.
    pub signature: MethodSignature,
    /// Bound callable, when the macro could build one for this shape.
    pub invoker: Option<Invoker<S>>,
}

impl<S> MethodEntry<S> {
    /// Creates an entry.
    pub fn new(signature: MethodSignature, invoker: Option<Invoker<S>>) -> Self {
        Self { signature, invoker }
    }
}
