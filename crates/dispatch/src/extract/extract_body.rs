use crate::container::Container;
use crate::error::DispatchResult;
use crate::extract::{Form, FromRequest, Json};
use crate::{DispatchError, Request};
use bytes::Bytes;
use serde::de::DeserializeOwned;

impl FromRequest for Bytes {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        Ok(req.body().clone())
    }
}

impl FromRequest for String {
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        // todo: honor the charset of the content-type header
        String::from_utf8(req.body().to_vec()).map_err(|_| DispatchError::extract("request body is not utf8"))
    }
}

impl<T> FromRequest for Form<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        serde_urlencoded::from_bytes::<T>(req.body()).map(Form).map_err(DispatchError::extract)
    }
}

impl<T> FromRequest for Json<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        serde_json::from_slice::<T>(req.body()).map(Json).map_err(DispatchError::extract)
    }
}
