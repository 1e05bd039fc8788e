//! Middleware wrap a route's action.
//!
//! A middleware receives the request and a [`Next`] continuation. Calling
//! [`Next::run`] passes control inward; returning without calling it short-circuits the
//! chain, and its reply becomes the route's reply.
//!
//! Routes refer to middleware through [`MiddlewareRef`]s, which are resolved against the
//! container each time a pipeline is built.

use crate::container::{Container, Injectable, Key};
use crate::error::DispatchResult;
use crate::pipeline::Endpoint;
use crate::responder::Reply;
use crate::{ContainerError, DispatchError, Request};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: Request, next: Next) -> DispatchResult<Reply>;
}

/// The rest of the chain, ending with the route's action.
pub struct Next {
    endpoint: Arc<dyn Endpoint>,
}

impl Next {
    pub(crate) fn new(endpoint: Arc<dyn Endpoint>) -> Self {
        Self { endpoint }
    }

    pub async fn run(self, req: Request) -> DispatchResult<Reply> {
        self.endpoint.call(req).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// a middleware backed by an async closure
#[derive(Clone)]
pub struct FnMiddleware<F> {
    f: F,
}

/// Adapts `async fn(Request, Next) -> DispatchResult<Reply>` to a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = DispatchResult<Reply>> + Send,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = DispatchResult<Reply>> + Send,
{
    async fn handle(&self, req: Request, next: Next) -> DispatchResult<Reply> {
        (self.f)(req, next).await
    }
}

type ResolveFn = fn(&Container) -> DispatchResult<Arc<dyn Middleware>>;

/// How a route refers to one of its middleware.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// A middleware type, constructed through the container.
    Typed { key: Key, resolve: ResolveFn },
    /// A container key whose value must be registered as `dyn Middleware`.
    Named(Key),
    /// A ready-made middleware.
    Instance(Arc<dyn Middleware>),
}

impl MiddlewareRef {
    pub fn of<M>() -> Self
    where
        M: Middleware + Injectable,
    {
        MiddlewareRef::Typed { key: Key::of::<M>(), resolve: make_middleware::<M> }
    }

    pub fn named(key: impl Into<Key>) -> Self {
        MiddlewareRef::Named(key.into())
    }

    pub fn instance<M: Middleware + 'static>(middleware: M) -> Self {
        MiddlewareRef::Instance(Arc::new(middleware))
    }

    pub fn resolve(&self, container: &Container) -> DispatchResult<Arc<dyn Middleware>> {
        match self {
            MiddlewareRef::Typed { resolve, .. } => resolve(container),
            MiddlewareRef::Named(key) => match container.resolve_named::<dyn Middleware>(key) {
                Ok(middleware) => Ok(middleware),
                Err(ContainerError::TypeMismatch { key, .. }) => {
                    Err(DispatchError::invalid_middleware(format!("`{key}` does not resolve to a middleware")))
                }
                Err(ContainerError::UnresolvableType { key }) => {
                    Err(DispatchError::invalid_middleware(format!("`{key}` is not a registered middleware")))
                }
                Err(e) => Err(e.into()),
            },
            MiddlewareRef::Instance(middleware) => Ok(Arc::clone(middleware)),
        }
    }
}

fn make_middleware<M: Middleware + Injectable>(container: &Container) -> DispatchResult<Arc<dyn Middleware>> {
    Ok(container.make::<M>()?)
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareRef::Typed { key, .. } => f.debug_tuple("Typed").field(key).finish(),
            MiddlewareRef::Named(key) => f.debug_tuple("Named").field(key).finish(),
            MiddlewareRef::Instance(_) => f.write_str("Instance"),
        }
    }
}

impl From<&'static str> for MiddlewareRef {
    fn from(key: &'static str) -> Self {
        MiddlewareRef::named(key)
    }
}

impl From<String> for MiddlewareRef {
    fn from(key: String) -> Self {
        MiddlewareRef::named(key)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        MiddlewareRef::Instance(middleware)
    }
}

impl<F> From<FnMiddleware<F>> for MiddlewareRef
where
    FnMiddleware<F>: Middleware + 'static,
{
    fn from(middleware: FnMiddleware<F>) -> Self {
        MiddlewareRef::instance(middleware)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::text;
    use http::StatusCode;

    #[derive(Default)]
    struct Stamp;

    crate::injectable_default!(Stamp);

    #[async_trait]
    impl Middleware for Stamp {
        async fn handle(&self, req: Request, _next: Next) -> DispatchResult<Reply> {
            Ok(text(req.path().to_owned(), StatusCode::OK))
        }
    }

    struct NotAMiddleware;

    #[test]
    fn typed_reference_is_made_through_the_container() {
        let container = Container::new();
        assert!(MiddlewareRef::of::<Stamp>().resolve(&container).is_ok());
    }

    #[test]
    fn named_reference_resolves_registered_middleware() {
        let mut container = Container::new();
        container.instance_named::<dyn Middleware>("stamp", Arc::new(Stamp));

        assert!(MiddlewareRef::from("stamp").resolve(&container).is_ok());
    }

    #[test]
    fn named_reference_to_other_value_is_invalid() {
        let mut container = Container::new();
        container.instance_named("stamp", Arc::new(NotAMiddleware));

        let err = MiddlewareRef::from("stamp").resolve(&container).err().unwrap();
        assert!(matches!(err, DispatchError::InvalidMiddleware { .. }));
    }

    #[test]
    fn unregistered_name_is_invalid() {
        let err = MiddlewareRef::named("missing").resolve(&Container::new()).err().unwrap();
        match err {
            DispatchError::InvalidMiddleware { reason } => assert_eq!(reason, "`missing` is not a registered middleware"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failing_middleware_construction_is_kept() {
        let mut container = Container::new();
        container.bind_named::<dyn Middleware, _>("broken", |_| Err(ContainerError::construction("broken", "no key")));

        let err = MiddlewareRef::named("broken").resolve(&container).err().unwrap();
        assert!(matches!(err, DispatchError::Container { source: ContainerError::Construction { .. } }));
    }

    #[test]
    fn closures_become_instances() {
        let reference = MiddlewareRef::from(middleware_fn(|req: Request, next: Next| next.run(req)));
        assert!(matches!(reference, MiddlewareRef::Instance(_)));
    }
}
