//! Type-erased callables for the four method shapes.
//!
//! An [`Invoker`] owns a closure that calls one method on a shared receiver.
//! Its generic constructors capture the request and response types, so the
//! erased form only ever sees raw body bytes in and encoded bytes out.

use crate::context::Context;
use crate::error::DispatchError;
use crate::executor::{decode_request, encode_response};
use crate::signature::MethodShape;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Erased call: receiver, context, and the request body if the method takes
/// one. Yields the encoded response for two-return methods.
type ErasedCall<S> = Arc<
    dyn Fn(Arc<S>, Context, Option<Bytes>) -> BoxFuture<Result<Option<Bytes>, DispatchError>>
        + Send
        + Sync,
>;

/// Which of the four shapes an invoker was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokerKind {
    /// `(ctx) -> Result<(), E>`
    Unit,
    /// `(ctx) -> Result<Res, E>`
    Reply,
    /// `(ctx, Req) -> Result<(), E>`
    Accept,
    /// `(ctx, Req) -> Result<Res, E>`
    Exchange,
}

impl InvokerKind {
    /// Whether the shape takes a request payload.
    pub const fn consumes_body(self) -> bool {
        matches!(self, Self::Accept | Self::Exchange)
    }

    /// Number of declared return values.
    pub const fn return_count(self) -> usize {
        match self {
            Self::Unit | Self::Accept => 1,
            Self::Reply | Self::Exchange => 2,
        }
    }

    /// Whether this kind can serve a validated method of `shape`.
    pub const fn matches(self, shape: &MethodShape) -> bool {
        self.consumes_body() == shape.consumes_body && self.return_count() == shape.return_count
    }
}

/// Bound callable for one method of service `S`.
pub struct Invoker<S> {
    kind: InvokerKind,
    call: ErasedCall<S>,
}

impl<S> Clone for Invoker<S> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            call: Arc::clone(&self.call),
        }
    }
}

impl<S> std::fmt::Debug for Invoker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker").field("kind", &self.kind).finish()
    }
}

impl<S> Invoker<S>
where
    S: Send + Sync + 'static,
{
    /// Binds `(ctx) -> Result<(), E>`.
    pub fn unit<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Arc<S>, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let f = Arc::new(f);
        Self::erase(InvokerKind::Unit, move |svc, ctx, _body| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                f(svc, ctx).await.map_err(DispatchError::method)?;
                Ok(None)
            })
        })
    }

    /// Binds `(ctx) -> Result<Res, E>`.
    pub fn reply<F, Fut, Res, E>(f: F) -> Self
    where
        F: Fn(Arc<S>, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
        Res: Serialize + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let f = Arc::new(f);
        Self::erase(InvokerKind::Reply, move |svc, ctx, _body| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let response = f(svc, ctx).await.map_err(DispatchError::method)?;
                encode_response(&response).map(Some)
            })
        })
    }

    /// Binds `(ctx, Req) -> Result<(), E>`.
    pub fn accept<F, Fut, Req, E>(f: F) -> Self
    where
        F: Fn(Arc<S>, Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        Req: DeserializeOwned + Serialize + Default + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let f = Arc::new(f);
        Self::erase(InvokerKind::Accept, move |svc, ctx, body| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let request = decode_request::<Req>(body.as_deref())?;
                f(svc, ctx, request).await.map_err(DispatchError::method)?;
                Ok(None)
            })
        })
    }

    /// Binds `(ctx, Req) -> Result<Res, E>`.
    pub fn exchange<F, Fut, Req, Res, E>(f: F) -> Self
    where
        F: Fn(Arc<S>, Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
        Req: DeserializeOwned + Serialize + Default + Send + 'static,
        Res: Serialize + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let f = Arc::new(f);
        Self::erase(InvokerKind::Exchange, move |svc, ctx, body| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let request = decode_request::<Req>(body.as_deref())?;
                let response = f(svc, ctx, request)
                    .await
                    .map_err(DispatchError::method)?;
                encode_response(&response).map(Some)
            })
        })
    }

    fn erase<C>(kind: InvokerKind, call: C) -> Self
    where
        C: Fn(Arc<S>, Context, Option<Bytes>) -> BoxFuture<Result<Option<Bytes>, DispatchError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind,
            call: Arc::new(call),
        }
    }
}

impl<S> Invoker<S> {
    /// The shape this invoker serves.
    pub fn kind(&self) -> InvokerKind {
        self.kind
    }

    /// Runs the bound method. `body` is ignored by shapes without a request.
    pub fn call(
        &self,
        receiver: Arc<S>,
        ctx: Context,
        body: Option<Bytes>,
    ) -> BoxFuture<Result<Option<Bytes>, DispatchError>> {
        (self.call)(receiver, ctx, body)
    }
}
