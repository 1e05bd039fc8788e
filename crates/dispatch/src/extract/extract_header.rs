use crate::container::Container;
use crate::error::DispatchResult;
use crate::extract::from_request::FromRequest;
use crate::Request;
use http::{HeaderMap, Method, Uri};
use std::net::IpAddr;

impl FromRequest for Method {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.method().clone())
    }
}

impl FromRequest for Uri {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.uri().clone())
    }
}

impl FromRequest for HeaderMap {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.headers().clone())
    }
}

/// The client address, `0.0.0.0` when unknown.
impl FromRequest for IpAddr {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.ip())
    }
}
