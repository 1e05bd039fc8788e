//! Composes a route's middleware around its action.
//!
//! Composition runs right to left: the action is the innermost endpoint and each
//! middleware, from last to first, wraps the endpoint built so far. The first middleware
//! of the list is therefore the first to see the request.

use crate::action::Action;
use crate::container::Container;
use crate::error::DispatchResult;
use crate::middleware::{Middleware, MiddlewareRef, Next};
use crate::responder::Reply;
use crate::Request;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub(crate) trait Endpoint: Send + Sync {
    async fn call(&self, req: Request) -> DispatchResult<Reply>;
}

struct MiddlewareLayer {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn Endpoint>,
}

#[async_trait]
impl Endpoint for MiddlewareLayer {
    async fn call(&self, req: Request) -> DispatchResult<Reply> {
        self.middleware.handle(req, Next::new(Arc::clone(&self.next))).await
    }
}

struct ActionEndpoint {
    action: Action,
    container: Arc<Container>,
}

#[async_trait]
impl Endpoint for ActionEndpoint {
    async fn call(&self, req: Request) -> DispatchResult<Reply> {
        self.action.invoke(req, &self.container).await
    }
}

/// One invocable chain for one matched route.
pub struct Pipeline {
    head: Arc<dyn Endpoint>,
}

impl Pipeline {
    /// Resolves every middleware reference, then wraps them around `action`.
    ///
    /// A reference that fails to resolve fails the build, so no middleware runs for a
    /// route whose chain is incomplete.
    pub fn build(middleware: &[MiddlewareRef], action: Action, container: Arc<Container>) -> DispatchResult<Self> {
        let resolved = middleware.iter().map(|m| m.resolve(&container)).collect::<DispatchResult<Vec<_>>>()?;

        let core: Arc<dyn Endpoint> = Arc::new(ActionEndpoint { action, container });
        let head = resolved
            .into_iter()
            .rev()
            .fold(core, |next, middleware| Arc::new(MiddlewareLayer { middleware, next }) as Arc<dyn Endpoint>);

        Ok(Self { head })
    }

    pub async fn run(&self, req: Request) -> DispatchResult<Reply> {
        self.head.call(req).await
    }
}
