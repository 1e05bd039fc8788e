//! Path parameter and query string extraction
//!
//! `Path<T>` deserializes the route's named captures into `T`, matching fields to
//! placeholders by name. `Query<T>` deserializes the query string with serde_qs, so nested
//! keys like `filter[name]=x` are supported.
//!
//! # Example
//! ```no_run
//! # use serde::Deserialize;
//! # use micro_dispatch::extract::{Path, Query};
//!
//! #[derive(Deserialize)]
//! struct Post {
//!     id: u64,
//! }
//!
//! #[derive(Deserialize)]
//! struct Paging {
//!     page: Option<u32>,
//! }
//!
//! async fn handler(Path(post): Path<Post>, Query(paging): Query<Paging>) {
//!     println!("post {} page {:?}", post.id, paging.page);
//! }
//! ```

use crate::container::Container;
use crate::error::DispatchResult;
use crate::extract::{FromRequest, Path, Query};
use crate::{DispatchError, Request};
use serde::de::DeserializeOwned;

impl<T> FromRequest for Path<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        // round-trip through the url-encoded form so "5" can land in a numeric field
        let encoded = serde_urlencoded::to_string(req.path_params().as_pairs()).map_err(DispatchError::extract)?;
        serde_urlencoded::from_str::<T>(&encoded).map(Path).map_err(DispatchError::extract)
    }
}

impl<T> FromRequest for Query<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: &Request, _container: &Container) -> DispatchResult<Self> {
        let query = req.uri().query().unwrap_or_default();
        serde_qs::from_str::<T>(query).map(Query).map_err(DispatchError::extract)
    }
}

#[cfg(test)]
mod tests {
    use crate::container::Container;
    use crate::extract::{FromRequest, Path, Query};
    use crate::request::PathParams;
    use crate::{DispatchError, Request};
    use bytes::Bytes;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct PostPage {
        id: u64,
        page: Option<u32>,
        #[serde(default = "default_format")]
        format: String,
    }

    fn default_format() -> String {
        "html".into()
    }

    fn request(uri: &str, params: &[(&str, &str)]) -> Request {
        let mut req = Request::from_http(http::Request::builder().uri(uri).body(Bytes::new()).unwrap());
        let params = params.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect::<Vec<_>>();
        req.set_path_params(PathParams::from(params));
        req
    }

    #[test]
    fn path_fields_are_matched_by_name() {
        let req = request("/posts/5/2", &[("page", "2"), ("id", "5")]);
        let Path(post) = Path::<PostPage>::from_request(&req, &Container::new()).unwrap();

        assert_eq!(post, PostPage { id: 5, page: Some(2), format: "html".into() });
    }

    #[test]
    fn missing_placeholders_use_defaults() {
        let req = request("/posts/5", &[("id", "5")]);
        let Path(post) = Path::<PostPage>::from_request(&req, &Container::new()).unwrap();

        assert_eq!(post.page, None);
        assert_eq!(post.format, "html");
    }

    #[test]
    fn malformed_path_value_is_an_extract_error() {
        let req = request("/posts/abc", &[("id", "abc")]);
        let err = Path::<PostPage>::from_request(&req, &Container::new()).unwrap_err();
        assert!(matches!(err, DispatchError::Extract { .. }));
    }

    #[derive(Deserialize, Debug)]
    struct Search {
        q: String,
        page: Option<u32>,
    }

    #[test]
    fn query_is_deserialized() {
        let req = request("/search?q=rust&page=3", &[]);
        let Query(search) = Query::<Search>::from_request(&req, &Container::new()).unwrap();

        assert_eq!(search.q, "rust");
        assert_eq!(search.page, Some(3));
    }

    #[test]
    fn optional_extractor_swallows_failures() {
        let req = request("/search", &[]);
        let search = Option::<Query<Search>>::from_request(&req, &Container::new()).unwrap();
        assert!(search.is_none());
    }
}
