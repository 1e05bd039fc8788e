//! The dispatcher.
//!
//! [`App`] owns the route table, the container and the configuration. For every request it
//! scans the routes in registration order; the first matching route that produces a reply
//! ends the scan. A route whose pipeline replies [`Reply::Nothing`] hands the request on to
//! the next match, unless fall-through is disabled, in which case the reply is `204`.
//!
//! Failures inside a route are logged and rendered as JSON. Production responses carry a
//! generic message only; development responses add the error message, the first frames of
//! the stack where it was raised and its cause chain.

use crate::body::ResponseBody;
use crate::config::{self, AppConfig};
use crate::container::{Container, Key};
use crate::error::{ContainerError, DispatchResult};
use crate::pipeline::Pipeline;
use crate::responder::{self, Reply};
use crate::router::{Route, Router};
use crate::{DispatchError, Request};
use bytes::Bytes;
use http::{Response, StatusCode};
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Display;
use std::iter;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug)]
pub struct App {
    router: Router,
    container: Arc<Container>,
    config: AppConfig,
}

#[derive(Debug)]
pub struct AppBuilder {
    router: Router,
    container: Container,
    config: AppConfig,
}

impl AppBuilder {
    fn new() -> Self {
        Self { router: Router::new(), container: Container::new(), config: AppConfig::default() }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a configuration file's content, readable through [`App::config_value`].
    pub fn config_file(mut self, name: &str, value: Value) -> Self {
        self.container.instance_named(config_key(name), Arc::new(value));
        self
    }

    pub fn build(self) -> App {
        info!(routes = self.router.len(), mode = ?self.config.runtime_mode(), "app ready");
        App { router: self.router, container: Arc::new(self.container), config: self.config }
    }
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn new(router: Router, container: Container, config: AppConfig) -> Self {
        Self::builder().router(router).container(container).config(config).build()
    }

    /// Dispatches a request built by the host server.
    pub async fn handle(&self, req: http::Request<Bytes>) -> Response<ResponseBody> {
        self.dispatch(Request::from_http(req)).await
    }

    pub async fn dispatch(&self, req: Request) -> Response<ResponseBody> {
        let req = match self.config.mount() {
            Some(mount_path) => req.with_mount_path(mount_path),
            None => req,
        };

        let method = req.method().clone();
        let path = req.path().to_owned();

        for (route, params) in self.router.matches(&method, &path) {
            debug!(%method, %path, template = %route.template(), "route matched");

            let mut route_req = req.clone();
            route_req.set_path_params(params);

            match self.run(route, route_req).await {
                Ok(Reply::Nothing) if self.config.falls_through() => {
                    debug!(%method, %path, template = %route.template(), "no reply, fall through");
                }
                Ok(reply) => return reply.into_response().unwrap_or_else(no_content),
                Err(e) => {
                    error!(cause = %e, %method, %path, template = %route.template(), "route failed");
                    return self.render_error(&e);
                }
            }
        }

        debug!(%method, %path, "no route matched");
        self.render_error(&DispatchError::route_not_found(method, path))
    }

    async fn run(&self, route: &Route, req: Request) -> DispatchResult<Reply> {
        let pipeline = Pipeline::build(route.middleware(), route.action().clone(), Arc::clone(&self.container))?;
        pipeline.run(req).await
    }

    fn render_error(&self, e: &DispatchError) -> Response<ResponseBody> {
        let status = e.status_code();

        let mut payload = Map::new();
        payload.insert("error".to_owned(), public_message(e).into());
        if !self.config.runtime_mode().is_production() && !matches!(e, DispatchError::RouteNotFound { .. }) {
            let depth = self.config.max_trace_depth();
            let causes = cause_chain(e, depth);
            let trace = match e.backtrace().map(|backtrace| stack_frames(backtrace, depth)) {
                Some(frames) if !frames.is_empty() => frames,
                _ => causes.clone(),
            };

            payload.insert("message".to_owned(), e.to_string().into());
            payload.insert("trace".to_owned(), trace.into());
            if !causes.is_empty() {
                payload.insert("causes".to_owned(), causes.into());
            }
        }

        match responder::json(&payload, status).map(Reply::into_response) {
            Ok(Some(response)) => response,
            _ => {
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = status;
                response
            }
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// See [`Router::url`].
    pub fn url(&self, name: &str, params: &[(&str, &dyn Display)]) -> DispatchResult<String> {
        self.router.url(name, params)
    }

    pub fn resolve<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.container.resolve::<T>()
    }

    /// Reads `file.key.path` from the configuration registered with
    /// [`AppBuilder::config_file`]; `file` alone returns the whole file.
    pub fn config_value(&self, path: &str) -> Option<Value> {
        let (file, rest) = match path.split_once('.') {
            Some((file, rest)) => (file, Some(rest)),
            None => (path, None),
        };

        let value = self.container.resolve_named::<Value>(config_key(file)).ok()?;
        match rest {
            Some(rest) => config::lookup(&value, rest).cloned(),
            None => Some(Value::clone(&value)),
        }
    }
}

fn config_key(file: &str) -> Key {
    Key::from(format!("config.{file}"))
}

fn no_content() -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn public_message(e: &DispatchError) -> &'static str {
    match e {
        DispatchError::RouteNotFound { .. } => "Route not found",
        _ => "Server Error",
    }
}

fn cause_chain(e: &DispatchError, depth: usize) -> Vec<String> {
    iter::successors(e.source(), |&cause| cause.source()).take(depth).map(ToString::to_string).collect()
}

/// Renders the first `depth` frames of `backtrace` as `symbol at file:line`, starting at the
/// code that raised the error.
fn stack_frames(backtrace: &Backtrace, depth: usize) -> Vec<String> {
    let rendered = backtrace.to_string();

    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines().map(str::trim) {
        if let Some((index, symbol)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(symbol.to_owned());
                continue;
            }
        }
        if let (Some(location), Some(frame)) = (line.strip_prefix("at "), frames.last_mut()) {
            frame.push_str(" at ");
            frame.push_str(location);
        }
    }

    frames
        .into_iter()
        .skip_while(|frame| is_capture_frame(frame))
        .take(depth)
        .collect()
}

fn is_capture_frame(frame: &str) -> bool {
    frame.starts_with("std::backtrace") || frame.contains("micro_dispatch::error::")
}

#[cfg(test)]
mod tests {
    use super::{cause_chain, stack_frames, App};
    use crate::config::{AppConfig, RuntimeMode};
    use crate::DispatchError;
    use serde_json::{json, Value};
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.1.as_deref().map(|layer| layer as &(dyn Error + 'static))
        }
    }

    fn nested(depth: usize) -> Layer {
        (0..depth).fold(Layer("root", None), |inner, _| Layer("wrap", Some(Box::new(inner))))
    }

    #[test]
    fn cause_chain_is_truncated() {
        let e = DispatchError::handler(nested(20));

        assert_eq!(cause_chain(&e, 10).len(), 10);
        assert_eq!(cause_chain(&e, 100).len(), 21);
        assert_eq!(cause_chain(&e, 100).last().map(String::as_str), Some("root"));
    }

    fn body_json(response: http::Response<crate::ResponseBody>) -> Value {
        serde_json::from_slice(response.body().as_bytes().unwrap()).unwrap()
    }

    #[test]
    fn production_errors_are_redacted() {
        let app = App::builder().build();
        let response = app.render_error(&DispatchError::handler(nested(1)));

        assert_eq!(response.status(), 500);
        assert_eq!(body_json(response), json!({"error": "Server Error"}));
    }

    #[test]
    fn development_errors_carry_details() {
        let app = App::builder().config(AppConfig::new().mode(RuntimeMode::Development).trace_depth(2)).build();
        let response = app.render_error(&DispatchError::handler(nested(5)));

        let body = body_json(response);
        assert_eq!(body["error"], "Server Error");
        assert_eq!(body["message"], "wrap");
        assert_eq!(body["causes"], json!(["wrap", "wrap"]));

        let trace = body["trace"].as_array().unwrap();
        assert!(!trace.is_empty() && trace.len() <= 2);
        assert_ne!(body["trace"], body["causes"]);
    }

    #[test]
    fn stack_frames_start_at_the_raising_code() {
        let e = DispatchError::handler("boom");
        let frames = stack_frames(e.backtrace().unwrap(), 3);

        assert!(!frames.is_empty() && frames.len() <= 3);
        assert!(frames.iter().all(|frame| !frame.starts_with("std::backtrace")));
        assert!(frames.iter().all(|frame| !frame.contains("micro_dispatch::error::")));
    }

    #[test]
    fn errors_without_a_stack_fall_back_to_the_cause_chain() {
        let app = App::builder().config(AppConfig::new().mode(RuntimeMode::Development)).build();
        let e = DispatchError::from(crate::ContainerError::construction("mailer", "smtp down"));
        let body = body_json(app.render_error(&e));

        assert_eq!(body["message"], "failed to construct mailer: smtp down");
        assert_eq!(body["trace"], json!(["smtp down"]));
    }

    #[test]
    fn extraction_failures_are_server_errors() {
        let app = App::builder().build();
        let response = app.render_error(&DispatchError::extract("invalid digit found in string"));

        assert_eq!(response.status(), 500);
        assert_eq!(body_json(response), json!({"error": "Server Error"}));
    }

    #[test]
    fn config_values_are_looked_up_by_dotted_path() {
        let app = App::builder().config_file("app", json!({"name": "blog", "mail": {"from": "a@b.c"}})).build();

        assert_eq!(app.config_value("app.name"), Some(json!("blog")));
        assert_eq!(app.config_value("app.mail.from"), Some(json!("a@b.c")));
        assert_eq!(app.config_value("app"), Some(json!({"name": "blog", "mail": {"from": "a@b.c"}})));
        assert_eq!(app.config_value("app.missing"), None);
        assert_eq!(app.config_value("database.host"), None);
    }
}
