use crate::container::Container;
use crate::error::DispatchResult;
use crate::extract::FromRequest;
use crate::fn_trait::FnTrait;
use crate::responder::{Reply, Responder};
use crate::Request;
use async_trait::async_trait;

use std::marker::PhantomData;

/// The terminal step of a route: turns the request into a [`Reply`].
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: Request, container: &Container) -> DispatchResult<Reply>;
}

/// a `FnTrait` holder which represents any async Fn
pub struct FnHandler<F, Args> {
    f: F,
    _phantom: PhantomData<fn(Args)>,
}

impl<F, Args> FnHandler<F, Args>
where
    F: FnTrait<Args>,
{
    fn new(f: F) -> Self {
        Self { f, _phantom: PhantomData }
    }
}

/// Adapts an async function to a [`RequestHandler`]; every argument is a [`FromRequest`]
/// extractor, the return value a [`Responder`].
pub fn handler_fn<F, Args>(f: F) -> FnHandler<F, Args>
where
    F: FnTrait<Args>,
{
    FnHandler::new(f)
}

#[async_trait]
impl<F, Args> RequestHandler for FnHandler<F, Args>
where
    F: FnTrait<Args> + Send + Sync,
    F::Output: Responder,
    Args: FromRequest + Send,
{
    async fn invoke(&self, req: Request, container: &Container) -> DispatchResult<Reply> {
        let args = Args::from_request(&req, container)?;
        let responder = self.f.call(args).await;
        responder.response_to(&req)
    }
}
