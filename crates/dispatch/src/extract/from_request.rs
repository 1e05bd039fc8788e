use crate::container::Container;
use crate::error::DispatchResult;
use crate::{PathParams, Request};

/// Produces a handler argument from the current request.
///
/// The container is available so arguments can be dependencies rather than request data.
pub trait FromRequest: Sized {
    fn from_request(req: &Request, container: &Container) -> DispatchResult<Self>;
}

/// A missing or malformed argument becomes `None` instead of failing the call.
impl<T> FromRequest for Option<T>
where
    T: FromRequest,
{
    fn from_request(req: &Request, container: &Container) -> DispatchResult<Self> {
        Ok(T::from_request(req, container).ok())
    }
}

impl<T> FromRequest for DispatchResult<T>
where
    T: FromRequest,
{
    fn from_request(req: &Request, container: &Container) -> DispatchResult<Self> {
        Ok(T::from_request(req, container))
    }
}

impl FromRequest for () {
    fn from_request(_req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(())
    }
}

/// The current request.
impl FromRequest for Request {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.clone())
    }
}

impl FromRequest for PathParams {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.path_params().clone())
    }
}
