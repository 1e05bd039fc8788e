//! Typed handler arguments.
//!
//! Every argument of a function handler implements [`FromRequest`]. Extraction happens
//! before the handler runs, in parameter order; the first failure aborts the call.

mod extract_body;
mod extract_header;
mod extract_inject;
mod extract_tuple;
mod extract_url;
mod from_request;

pub use from_request::FromRequest;

/// Represented as the captured path parameters, matched to fields by name
///
/// A placeholder that did not take part in the match is absent: give the field a
/// `#[serde(default)]` or make it an `Option`.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_dispatch::extract::Path;
/// # #[allow(dead_code)]
/// #[derive(Deserialize, Debug)]
/// struct PostId {
///     id: u64,
///     #[serde(default)]
///     page: Option<u32>,
/// }
///
/// // registered as "/posts/{id}/{page?}"
/// pub async fn show(Path(post): Path<PostId>) -> String {
///     format!("post {} page {:?}", post.id, post.page)
/// }
/// ```
#[derive(Debug)]
pub struct Path<T>(pub T);

/// Represented as form data
///
/// when `post` as a `application/x-www-form-urlencoded`, we can using this struct to inject data,
/// note: the struct must impl [`serde::Deserialize`]
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_dispatch::extract::Form;
/// # #[allow(dead_code)]
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(Form(params) : Form<Params>) -> String {
///     format!("received params: {:?}", params)
/// }
/// ```
#[derive(Debug)]
pub struct Form<T>(pub T);

/// Represented as json data
///
/// when `post` as a `application/json`, we can using this struct to inject data; returning
/// it from a handler replies with JSON.
///
/// # Example
/// ```
/// # use serde::{Deserialize, Serialize};
/// # use micro_dispatch::extract::Json;
/// # #[allow(dead_code)]
/// #[derive(Deserialize, Serialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(Json(params) : Json<Params>) -> Json<Params> {
///     Json(params)
/// }
/// ```
#[derive(Debug)]
pub struct Json<T>(pub T);

/// Represented as url query data
///
/// when request with url query, we can using this struct to inject data,
/// note: the struct must impl [`serde::Deserialize`]
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_dispatch::extract::Query;
/// # #[allow(dead_code)]
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(Query(params) : Query<Params>) -> String {
///     format!("received params: {:?}", params)
/// }
/// ```
#[derive(Debug)]
pub struct Query<T>(pub T);

/// A dependency constructed by the container, see [`Container::make`](crate::container::Container::make).
#[derive(Debug)]
pub struct Inject<T>(pub std::sync::Arc<T>);

/// A dependency looked up by its registered key, usually a trait object such as
/// `Service<dyn Mailer>`. See [`Container::resolve`](crate::container::Container::resolve).
#[derive(Debug)]
pub struct Service<T: ?Sized>(pub std::sync::Arc<T>);
