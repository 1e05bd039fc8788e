//! Request dispatch for small web applications.
//!
//! A request flows through three pieces:
//!
//! - the [`Router`] finds the routes whose method and URL template match;
//! - a pipeline wraps the route's [`Middleware`] around its [`Action`];
//! - the [`Container`] supplies the dependencies of controllers, middleware and handler
//!   arguments.
//!
//! [`App`] ties them together and turns every outcome into an HTTP response.
//!
//! # Example
//! ```
//! use micro_dispatch::extract::Path;
//! use micro_dispatch::{handler_fn, App, Router};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Post {
//!     id: u64,
//! }
//!
//! async fn show(Path(post): Path<Post>) -> String {
//!     format!("post {}", post.id)
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! router.get("/posts/{id}", handler_fn(show))?.name("post.show");
//!
//! let app = App::builder().router(router).build();
//! let request = http::Request::get("/posts/5").body(bytes::Bytes::new())?;
//! let response = app.handle(request).await;
//!
//! assert_eq!(response.status(), 200);
//! assert_eq!(app.url("post.show", &[("id", &5)])?, "/posts/5");
//! # Ok(())
//! # }
//! ```

mod action;
mod app;
mod body;
mod error;
mod fn_trait;
mod handler;
mod middleware;
mod pipeline;
mod request;
mod responder;

pub mod config;
pub mod container;
pub mod extract;
pub mod router;

pub use action::{Action, Controller, ControllerAction};
pub use app::{App, AppBuilder};
pub use body::ResponseBody;
pub use config::{AppConfig, RuntimeMode};
pub use container::{Container, Injectable};
pub use error::{ContainerError, DispatchError, DispatchResult, PatternError};
pub use extract::FromRequest;
pub use fn_trait::FnTrait;
pub use handler::{handler_fn, FnHandler, RequestHandler};
pub use middleware::{middleware_fn, FnMiddleware, Middleware, MiddlewareRef, Next};
pub use pipeline::Pipeline;
pub use request::{PathParams, Request};
pub use responder::{html, json, redirect, text, Reply, Responder};
pub use router::Router;
