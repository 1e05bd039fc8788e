//! What a route runs once its middleware let the request through.

use crate::container::{Container, Injectable, Key};
use crate::error::DispatchResult;
use crate::handler::RequestHandler;
use crate::responder::Reply;
use crate::{ContainerError, DispatchError, Request};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A controller exposes several actions, selected by method name.
///
/// Controllers are constructed through the container for every dispatch, so their
/// dependencies are injected by [`Injectable::inject`] or a registered factory.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use micro_dispatch::container::Container;
/// use micro_dispatch::{Controller, DispatchError, DispatchResult, Reply, Request};
///
/// #[derive(Default)]
/// struct PostController;
///
/// micro_dispatch::injectable_default!(PostController);
///
/// #[async_trait]
/// impl Controller for PostController {
///     async fn call(&self, method: &str, req: Request, _container: &Container) -> DispatchResult<Reply> {
///         match method {
///             "show" => Ok(Reply::Html(format!("post {}", req.param("id").unwrap_or_default()))),
///             other => Err(DispatchError::unknown_method("PostController", other)),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Controller: Send + Sync {
    async fn call(&self, method: &str, req: Request, container: &Container) -> DispatchResult<Reply>;
}

type ResolveFn = fn(&Container) -> DispatchResult<Arc<dyn Controller>>;

#[derive(Clone, Copy)]
enum Source {
    Typed(ResolveFn),
    Named,
}

/// A controller reference plus the method to call on it.
#[derive(Clone)]
pub struct ControllerAction {
    key: Key,
    method: String,
    source: Source,
}

impl ControllerAction {
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

/// A route's action: an async function, or a controller method.
#[derive(Clone)]
pub enum Action {
    Handler(Arc<dyn RequestHandler>),
    Controller(ControllerAction),
}

impl Action {
    pub fn handler<H: RequestHandler + 'static>(handler: H) -> Self {
        Action::Handler(Arc::new(handler))
    }

    /// Calls `method` on a controller of type `C`.
    pub fn controller<C>(method: impl Into<String>) -> Self
    where
        C: Controller + Injectable,
    {
        Action::Controller(ControllerAction {
            key: Key::of::<C>(),
            method: method.into(),
            source: Source::Typed(make_controller::<C>),
        })
    }

    /// Calls `method` on the controller registered under `key` as `dyn Controller`.
    pub fn named_controller(key: impl Into<Key>, method: impl Into<String>) -> Self {
        Action::Controller(ControllerAction { key: key.into(), method: method.into(), source: Source::Named })
    }

    pub(crate) async fn invoke(&self, req: Request, container: &Container) -> DispatchResult<Reply> {
        match self {
            Action::Handler(handler) => handler.invoke(req, container).await,
            Action::Controller(action) => {
                let controller = match action.source {
                    Source::Typed(make) => make(container)?,
                    Source::Named => resolve_named(&action.key, container)?,
                };
                controller.call(&action.method, req, container).await
            }
        }
    }
}

fn make_controller<C: Controller + Injectable>(container: &Container) -> DispatchResult<Arc<dyn Controller>> {
    Ok(container.make::<C>()?)
}

fn resolve_named(key: &Key, container: &Container) -> DispatchResult<Arc<dyn Controller>> {
    match container.resolve_named::<dyn Controller>(key) {
        Ok(controller) => Ok(controller),
        Err(ContainerError::TypeMismatch { key, .. }) => {
            Err(DispatchError::invalid_action(format!("`{key}` does not resolve to a controller")))
        }
        Err(e) => Err(e.into()),
    }
}

impl<H: RequestHandler + 'static> From<H> for Action {
    fn from(handler: H) -> Self {
        Action::handler(handler)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Handler(_) => f.write_str("Handler"),
            Action::Controller(action) => {
                f.debug_struct("Controller").field("key", &action.key).field("method", &action.method).finish()
            }
        }
    }
}
