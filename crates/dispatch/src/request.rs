//! The request value seen by middleware and handlers.
//!
//! This module contains the two request-side types of the dispatcher:
//! - `Request`: method, path, headers, client address, decoded input and path parameters
//! - `PathParams`: the named captures of the route that matched the request path
//!
//! A `Request` is built from an [`http::Request`] handed over by the hosting server. The
//! query string and `application/x-www-form-urlencoded` bodies are decoded once, up front,
//! so [`Request::input`] can look values up without touching the body again.

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    path: String,
    remote_addr: Option<SocketAddr>,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    body: Bytes,
    path_params: PathParams,
    extensions: Extensions,
}

impl Request {
    /// Creates a request from the parts the hosting server decoded.
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();

        let path = normalize_path(parts.uri.path(), None);
        let query = parts.uri.query().map(decode_pairs).unwrap_or_default();
        let form = if is_form(&parts.headers) { decode_pairs(&body) } else { Vec::new() };

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            path,
            remote_addr: None,
            query,
            form,
            body,
            path_params: PathParams::empty(),
            extensions: parts.extensions,
        }
    }

    /// Sets the address of the peer that sent this request.
    pub fn with_remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }

    /// Strips the path the application is mounted under, e.g. `/app` for `/app/users`.
    pub fn with_mount_path(mut self, mount_path: &str) -> Self {
        self.path = normalize_path(self.uri.path(), Some(mount_path));
        self
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request path relative to the mount path; never empty.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The client IP, or `0.0.0.0` when the host did not report one.
    pub fn ip(&self) -> IpAddr {
        self.remote_addr.map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |addr| addr.ip())
    }

    /// Looks `key` up in the query string.
    pub fn query(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    /// Looks `key` up in the url-encoded form body.
    pub fn post(&self, key: &str) -> Option<&str> {
        lookup(&self.form, key)
    }

    /// Looks `key` up in the form body first, then in the query string.
    pub fn input(&self, key: &str) -> Option<&str> {
        self.post(key).or_else(|| self.query(key))
    }

    pub fn input_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.input(key).unwrap_or(default)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns a reference to the path parameters captured by the matched route
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Shortcut for `path_params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name)
    }

    /// Per-request storage, e.g. for an authenticated user set by a middleware.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn set_path_params(&mut self, path_params: PathParams) {
        self.path_params = path_params;
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|mime| mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
}

fn decode_pairs<T: AsRef<[u8]> + ?Sized>(input: &T) -> Vec<(String, String)> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(input.as_ref()).unwrap_or_else(|e| {
        warn!(cause = %e, "can't decode url-encoded input, ignore it");
        Vec::new()
    })
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn normalize_path(path: &str, mount_path: Option<&str>) -> String {
    let base = mount_path.map(|mount| mount.trim_end_matches('/')).unwrap_or_default();

    let stripped = match path.strip_prefix(base) {
        Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path,
    };

    if stripped.is_empty() { "/".to_owned() } else { stripped.to_owned() }
}

/// Represents path parameters extracted from the URL path of an HTTP request.
///
/// Path parameters are named segments in the URL path that can be extracted and accessed
/// by name. For example, in the path "/users/{id}", "id" is a path parameter. Optional
/// placeholders that did not take part in the match are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        lookup(&self.params, key.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn as_pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

impl From<Vec<(String, String)>> for PathParams {
    fn from(params: Vec<(String, String)>) -> Self {
        Self { params }
    }
}
