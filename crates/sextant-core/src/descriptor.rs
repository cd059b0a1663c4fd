//! Service and method descriptors.
//!
//! A [`ServiceDescriptor`] is built once per service object from its method
//! table. Construction validates every method; afterwards only the verb and
//! path of each method may change, and only until the routes are bound.

use crate::binder::{join_path, BindError, Endpoint, RouteBinder, Verb};
use crate::error::RegistrationError;
use crate::executor::execute;
use crate::invoker::Invoker;
use crate::service::Service;
use crate::signature::{validate, MethodShape};
use std::collections::HashMap;
use std::sync::Arc;

/// A validated, routable method.
#[derive(Debug)]
pub struct MethodDescriptor<S> {
    service: &'static str,
    name: &'static str,
    verb: Verb,
    path: String,
    shape: MethodShape,
    invoker: Invoker<S>,
}

impl<S> Clone for MethodDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service,
            name: self.name,
            verb: self.verb,
            path: self.path.clone(),
            shape: self.shape,
            invoker: self.invoker.clone(),
        }
    }
}

impl<S> MethodDescriptor<S> {
    /// Name of the owning service.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Verb the method is routed under.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Path relative to the mount point.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a request payload is decoded from the body.
    pub fn consumes_body(&self) -> bool {
        self.shape.consumes_body
    }

    /// 1 for error-only methods, 2 for response + error.
    pub fn return_count(&self) -> usize {
        self.shape.return_count
    }

    /// Declared request type name.
    pub fn request_type(&self) -> Option<&'static str> {
        self.shape.request_type
    }

    /// Declared response type name.
    pub fn response_type(&self) -> Option<&'static str> {
        self.shape.response_type
    }

    /// The bound callable.
    pub fn invoker(&self) -> &Invoker<S> {
        &self.invoker
    }
}

impl<S: Send + Sync + 'static> MethodDescriptor<S> {
    /// Produces the entry point a router calls for each request.
    ///
    /// The endpoint captures a snapshot of this descriptor; later `route`
    /// calls do not affect endpoints already handed out.
    pub fn endpoint(&self, receiver: Arc<S>) -> Endpoint {
        let method = Arc::new(self.clone());
        Endpoint::new(self.service, self.name, move |ctx| {
            let method = Arc::clone(&method);
            let receiver = Arc::clone(&receiver);
            Box::pin(async move { execute(&method, receiver, ctx).await })
        })
    }
}

/// The validated, routable view of one service object.
///
/// # Example
///
/// ```
/// use sextant_core::{BindError, Endpoint, RouteBinder, ServiceDescriptor, Verb};
/// # use sextant_core::{Context, Invoker, MethodEntry, MethodSignature, Receiver, Service, ServiceError, TypeTag};
/// # use std::sync::Arc;
/// # struct Jobs;
/// # impl Service for Jobs {
/// #     const NAME: &'static str = "Jobs";
/// #     fn methods() -> Vec<MethodEntry<Self>> {
/// #         vec![MethodEntry::new(
/// #             MethodSignature::new("list", Receiver::Shared, vec![TypeTag::Context],
/// #                 vec![TypeTag::error("ServiceError")], false),
/// #             Some(Invoker::unit(|_: Arc<Self>, _: Context| async { Ok::<_, ServiceError>(()) })),
/// #         )]
/// #     }
/// # }
///
/// #[derive(Default)]
/// struct Routes(Vec<(Verb, String)>);
///
/// impl RouteBinder for Routes {
///     fn bind(&mut self, verb: Verb, path: &str, _endpoint: Endpoint) -> Result<(), BindError> {
///         self.0.push((verb, path.to_string()));
///         Ok(())
///     }
/// }
///
/// let mut jobs = ServiceDescriptor::build(Jobs).unwrap();
/// jobs.get("/", "list").unwrap();
///
/// let mut routes = Routes::default();
/// jobs.bind_routes("/jobs", &mut routes).unwrap();
/// assert_eq!(routes.0, vec![(Verb::Get, "/jobs/".to_string())]);
/// ```
#[derive(Debug)]
pub struct ServiceDescriptor<S> {
    name: &'static str,
    path: String,
    methods: HashMap<&'static str, MethodDescriptor<S>>,
    receiver: Arc<S>,
}

/// Builds a descriptor for `service`. See [`ServiceDescriptor::build`].
pub fn build_service<S: Service>(service: S) -> Result<ServiceDescriptor<S>, RegistrationError> {
    ServiceDescriptor::build(service)
}

impl<S: Service> ServiceDescriptor<S> {
    /// Validates `service`'s method table and builds its descriptor.
    ///
    /// Fails on the first method that breaks the calling convention. No
    /// descriptor exists in that case, so nothing can be bound.
    pub fn build(service: S) -> Result<Self, RegistrationError> {
        Self::from_arc(Arc::new(service))
    }

    /// Same as [`build`](Self::build) for a receiver the caller also holds.
    pub fn from_arc(receiver: Arc<S>) -> Result<Self, RegistrationError> {
        let name = S::NAME;
        let entries = S::methods();
        let mut methods = HashMap::with_capacity(entries.len());

        for entry in entries {
            let signature = entry.signature;
            let shape = match validate(name, &signature) {
                Ok(shape) => shape,
                Err(err) => {
                    tracing::warn!(service = name, error = %err, "service registration failed");
                    return Err(err);
                }
            };

            let invoker = entry
                .invoker
                .filter(|invoker| invoker.kind().matches(&shape))
                .ok_or_else(|| RegistrationError::NotInvocable {
                    service: name.to_string(),
                    method: signature.name.to_string(),
                })?;

            let descriptor = MethodDescriptor {
                service: name,
                name: signature.name,
                verb: Verb::Get,
                path: signature.name.to_string(),
                shape,
                invoker,
            };
            if methods.insert(signature.name, descriptor).is_some() {
                return Err(RegistrationError::DuplicateMethod {
                    service: name.to_string(),
                    method: signature.name.to_string(),
                });
            }
        }

        tracing::debug!(service = name, methods = methods.len(), "service registered");

        Ok(Self {
            name,
            path: format!("/{name}"),
            methods,
            receiver,
        })
    }
}

impl<S> ServiceDescriptor<S> {
    /// Service name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Default mount path, `/` + name.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor<S>> {
        self.methods.get(name)
    }

    /// Iterates over all methods, in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor<S>> {
        self.methods.values()
    }

    /// Number of methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the service exposes no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// The shared receiver every method runs against.
    pub fn receiver(&self) -> &Arc<S> {
        &self.receiver
    }

    /// Assigns `verb` and `path` to `method`. The last assignment wins.
    pub fn route(
        &mut self,
        verb: Verb,
        path: impl Into<String>,
        method: &str,
    ) -> Result<&mut Self, RegistrationError> {
        let descriptor =
            self.methods
                .get_mut(method)
                .ok_or_else(|| RegistrationError::UnknownMethod {
                    service: self.name.to_string(),
                    method: method.to_string(),
                })?;
        descriptor.verb = verb;
        descriptor.path = path.into();
        Ok(self)
    }

    /// `route(Verb::Get, path, method)`.
    pub fn get(
        &mut self,
        path: impl Into<String>,
        method: &str,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Verb::Get, path, method)
    }

    /// `route(Verb::Post, path, method)`.
    pub fn post(
        &mut self,
        path: impl Into<String>,
        method: &str,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Verb::Post, path, method)
    }

    /// `route(Verb::Put, path, method)`.
    pub fn put(
        &mut self,
        path: impl Into<String>,
        method: &str,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Verb::Put, path, method)
    }
}

impl<S: Send + Sync + 'static> ServiceDescriptor<S> {
    /// Binds every method under `mount` through `binder`.
    ///
    /// Stops at the first binder error.
    pub fn bind_routes<B>(&self, mount: &str, binder: &mut B) -> Result<(), BindError>
    where
        B: RouteBinder + ?Sized,
    {
        for method in self.methods.values() {
            let path = join_path(mount, method.path());
            let endpoint = method.endpoint(Arc::clone(&self.receiver));
            binder.bind(method.verb(), &path, endpoint)?;
            tracing::debug!(
                service = self.name,
                method = method.name(),
                verb = %method.verb(),
                path = %path,
                "route bound"
            );
        }
        Ok(())
    }

    /// Binds every method under the default path.
    pub fn mount<B>(&self, binder: &mut B) -> Result<(), BindError>
    where
        B: RouteBinder + ?Sized,
    {
        self.bind_routes(&self.path, binder)
    }
}
