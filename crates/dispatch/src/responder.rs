//! Response handling module that converts handler results into replies.
//!
//! A handler (or middleware) finishes with a [`Reply`]:
//!
//! - [`Reply::Response`]: a response emitted explicitly through [`json`], [`text`], [`html`]
//!   or [`redirect`], or built by hand;
//! - [`Reply::Json`] / [`Reply::Html`]: a value whose response shape the dispatcher infers,
//!   JSON for structured data and HTML for strings, both with status 200;
//! - [`Reply::Nothing`]: no recognized value; the dispatcher keeps scanning routes.
//!
//! The [`Responder`] trait converts handler return types into a [`Reply`].

use crate::body::ResponseBody;
use crate::error::DispatchResult;
use crate::extract::Json;
use crate::{DispatchError, Request};
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;

const APPLICATION_JSON_UTF_8: &str = "application/json; charset=utf-8";
const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";
const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";

#[derive(Debug)]
pub enum Reply {
    Response(Response<ResponseBody>),
    Json(serde_json::Value),
    Html(String),
    Nothing,
}

impl Reply {
    #[inline]
    pub fn is_nothing(&self) -> bool {
        matches!(self, Reply::Nothing)
    }

    /// Turns the reply into the response it stands for, `None` for [`Reply::Nothing`].
    pub fn into_response(self) -> Option<Response<ResponseBody>> {
        match self {
            Reply::Response(response) => Some(response),
            Reply::Json(value) => Some(with_content_type(StatusCode::OK, APPLICATION_JSON_UTF_8, value.to_string())),
            Reply::Html(body) => Some(with_content_type(StatusCode::OK, TEXT_HTML_UTF_8, body)),
            Reply::Nothing => None,
        }
    }
}

/// Emits `value` as JSON with the given status.
pub fn json<T: Serialize + ?Sized>(value: &T, status: StatusCode) -> DispatchResult<Reply> {
    let body = serde_json::to_vec(value)?;
    Ok(Reply::Response(with_content_type(status, APPLICATION_JSON_UTF_8, body)))
}

/// Emits `body` as `text/plain` with the given status.
pub fn text(body: impl Into<String>, status: StatusCode) -> Reply {
    Reply::Response(with_content_type(status, TEXT_PLAIN_UTF_8, body.into()))
}

/// Emits `body` as `text/html` with the given status.
pub fn html(body: impl Into<String>, status: StatusCode) -> Reply {
    Reply::Response(with_content_type(status, TEXT_HTML_UTF_8, body.into()))
}

/// Emits a redirect to `location`; `status` is usually `302 Found`.
pub fn redirect(location: &str, status: StatusCode) -> DispatchResult<Reply> {
    let location = HeaderValue::from_str(location).map_err(DispatchError::handler)?;

    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = status;
    response.headers_mut().insert(LOCATION, location);
    Ok(Reply::Response(response))
}

fn with_content_type(status: StatusCode, content_type: &'static str, body: impl Into<ResponseBody>) -> Response<ResponseBody> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// A trait for types that can be returned from handlers and middleware.
pub trait Responder {
    fn response_to(self, req: &Request) -> DispatchResult<Reply>;
}

impl Responder for Reply {
    #[inline]
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(self)
    }
}

/// A failed handler surfaces its error at the route boundary.
impl<T: Responder, E: Into<DispatchError>> Responder for Result<T, E> {
    fn response_to(self, req: &Request) -> DispatchResult<Reply> {
        match self {
            Ok(t) => t.response_to(req),
            Err(e) => Err(e.into()),
        }
    }
}

/// None case produces no reply.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &Request) -> DispatchResult<Reply> {
        match self {
            Some(t) => t.response_to(req),
            None => Ok(Reply::Nothing),
        }
    }
}

/// Implementation for Response allows passing through pre-built responses.
impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Response(self.map(Into::into)))
    }
}

/// Implementation for (StatusCode, T) tuple allows setting a status code
/// along with the response content.
impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &Request) -> DispatchResult<Reply> {
        let (status, responder) = self;
        let mut response = responder.response_to(req)?.into_response().unwrap_or_else(|| Response::new(ResponseBody::empty()));
        *response.status_mut() = status;
        Ok(Reply::Response(response))
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self, req: &Request) -> DispatchResult<Reply> {
        (*self).response_to(req)
    }
}

impl Responder for () {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Nothing)
    }
}

impl Responder for &'static str {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Html(self.to_owned()))
    }
}

impl Responder for String {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Html(self))
    }
}

impl Responder for serde_json::Value {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Json(self))
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Json(serde_json::to_value(self.0)?))
    }
}

impl<T: Serialize> Responder for Vec<T> {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        Ok(Reply::Json(serde_json::to_value(self)?))
    }
}

impl Responder for Infallible {
    fn response_to(self, _req: &Request) -> DispatchResult<Reply> {
        match self {}
    }
}

#[cfg(test)]
mod tests {
    use super::{Reply, Responder, html, json, redirect, text};
    use crate::extract::Json;
    use crate::{DispatchError, Request};
    use bytes::Bytes;
    use http::StatusCode;
    use http::header::{CONTENT_TYPE, LOCATION};
    use serde_json::json;

    fn request() -> Request {
        Request::from_http(http::Request::builder().uri("/").body(Bytes::new()).unwrap())
    }

    fn body_of(reply: Reply) -> (StatusCode, String, String) {
        let response = reply.into_response().unwrap();
        let content_type = response.headers().get(CONTENT_TYPE).map(|v| v.to_str().unwrap().to_owned()).unwrap_or_default();
        let body = response.body().as_bytes().map(|b| String::from_utf8(b.to_vec()).unwrap()).unwrap_or_default();
        (response.status(), content_type, body)
    }

    #[test]
    fn strings_are_inferred_as_html() {
        let reply = "<h1>hi</h1>".response_to(&request()).unwrap();
        assert_eq!(
            body_of(reply),
            (StatusCode::OK, "text/html; charset=utf-8".to_owned(), "<h1>hi</h1>".to_owned())
        );
    }

    #[test]
    fn structured_values_are_inferred_as_json() {
        let reply = json!({"id": 5}).response_to(&request()).unwrap();
        assert_eq!(
            body_of(reply),
            (StatusCode::OK, "application/json; charset=utf-8".to_owned(), r#"{"id":5}"#.to_owned())
        );

        let reply = vec![1, 2, 3].response_to(&request()).unwrap();
        assert_eq!(body_of(reply).2, "[1,2,3]");

        let reply = Json(json!(["a"])).response_to(&request()).unwrap();
        assert!(matches!(reply, Reply::Json(_)));
    }

    #[test]
    fn unit_and_none_are_nothing() {
        assert!(().response_to(&request()).unwrap().is_nothing());
        assert!(None::<String>.response_to(&request()).unwrap().is_nothing());
        assert!(Reply::Nothing.into_response().is_none());
    }

    #[test]
    fn errors_propagate() {
        let result: Result<String, DispatchError> = Err(DispatchError::invalid_action("boom"));
        let err = result.response_to(&request()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAction { .. }));
    }

    #[test]
    fn status_tuple_overrides_inferred_status() {
        let reply = (StatusCode::CREATED, json!({"ok": true})).response_to(&request()).unwrap();
        let (status, content_type, _) = body_of(reply);
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(content_type, "application/json; charset=utf-8");

        let reply = (StatusCode::ACCEPTED, ()).response_to(&request()).unwrap();
        assert_eq!(body_of(reply).0, StatusCode::ACCEPTED);
    }

    #[test]
    fn emission_helpers() {
        let (status, content_type, body) = body_of(json(&json!({"error": "nope"}), StatusCode::UNPROCESSABLE_ENTITY).unwrap());
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(content_type, "application/json; charset=utf-8");
        assert_eq!(body, r#"{"error":"nope"}"#);

        let (status, content_type, body) = body_of(text("plain", StatusCode::OK));
        assert_eq!((status, content_type.as_str(), body.as_str()), (StatusCode::OK, "text/plain; charset=utf-8", "plain"));

        let (status, _, body) = body_of(html("<p>gone</p>", StatusCode::GONE));
        assert_eq!((status, body.as_str()), (StatusCode::GONE, "<p>gone</p>"));

        let response = redirect("/login", StatusCode::FOUND).unwrap().into_response().unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
    }
}
