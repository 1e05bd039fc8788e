use crate::container::{Container, Injectable};
use crate::error::DispatchResult;
use crate::extract::{FromRequest, Inject, Service};
use crate::Request;

impl<T> FromRequest for Inject<T>
where
    T: Injectable,
{
    fn from_request(_req: &Request, container: &Container) -> DispatchResult<Self> {
        Ok(Inject(container.make::<T>()?))
    }
}

impl<T> FromRequest for Service<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn from_request(_req: &Request, container: &Container) -> DispatchResult<Self> {
        Ok(Service(container.resolve::<T>()?))
    }
}
