//! The route table.
//!
//! Routes are kept in registration order; the dispatcher scans them front to back. Every
//! registration compiles its template right away, so a malformed template surfaces as a
//! [`PatternError`] while the application is being assembled.
//!
//! # Example
//! ```
//! use micro_dispatch::router::{GroupOptions, Router};
//! use micro_dispatch::handler_fn;
//!
//! async fn index() -> &'static str {
//!     "posts"
//! }
//!
//! # fn main() -> Result<(), micro_dispatch::PatternError> {
//! let mut router = Router::new();
//! router.group(GroupOptions::new().prefix("/admin").name("admin."), |r| {
//!     r.get("/posts", handler_fn(index))?.name("posts.index");
//!     Ok(())
//! })?;
//!
//! assert_eq!(router.url("admin.posts.index", &[]).unwrap(), "/admin/posts");
//! # Ok(())
//! # }
//! ```

pub mod pattern;

use crate::action::Action;
use crate::error::{DispatchResult, PatternError};
use crate::middleware::MiddlewareRef;
use crate::request::PathParams;
use crate::DispatchError;
use http::Method;
use once_cell::sync::Lazy;
use pattern::Pattern;
use regex::Regex;
use std::fmt::Display;
use tracing::debug;

static OPTIONAL_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/?\{\w+\?\}").expect("optional segment pattern is a valid regex"));

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    template: String,
    pattern: Pattern,
    action: Action,
    middleware: Vec<MiddlewareRef>,
    name: Option<String>,
}

impl Route {
    fn new(method: Method, template: &str, action: Action) -> Result<Self, PatternError> {
        let template = normalize_template(template);
        let pattern = Pattern::compile(&template)?;
        Ok(Self { method, template, pattern, action, middleware: vec![], name: None })
    }

    /// Returns the captured parameters if both the method and the path match.
    pub fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if self.method != method {
            return None;
        }
        self.pattern.matches(path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn prefix_with(&mut self, prefix: &str) -> Result<(), PatternError> {
        let template = match self.template.as_str() {
            "/" => prefix.to_owned(),
            template => format!("{prefix}{template}"),
        };
        self.pattern = Pattern::compile(&template)?;
        self.template = template;
        Ok(())
    }
}

/// Options shared by every route registered inside [`Router::group`].
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    prefix: Option<String>,
    middleware: Vec<MiddlewareRef>,
    name: Option<String>,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path prefix put in front of every route template.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Middleware that run before the routes' own middleware.
    pub fn middleware<I>(mut self, middleware: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MiddlewareRef>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Prefix for the names of routes that have one.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        pub fn $name(&mut self, template: &str, action: impl Into<Action>) -> Result<&mut Self, PatternError> {
            self.add(Method::$method, template, action)
        }
    };
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route. The method is upper-cased and the template gets a single leading `/`.
    ///
    /// Optional placeholders belong at the end of a template. `/a/{x?}/b` is accepted but
    /// also matches `/a/b`-like paths it was not meant for.
    pub fn add(&mut self, method: Method, template: &str, action: impl Into<Action>) -> Result<&mut Self, PatternError> {
        let route = Route::new(normalize_method(method), template, action.into())?;
        debug!(method = %route.method, template = %route.template, "register route");
        self.routes.push(route);
        Ok(self)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(patch, PATCH);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);

    /// Registers the same action for GET, POST, PUT and DELETE.
    ///
    /// These are four routes; [`Router::name`] and [`Router::middleware`] called afterwards
    /// only affect the last one (DELETE).
    pub fn any(&mut self, template: &str, action: impl Into<Action>) -> Result<&mut Self, PatternError> {
        let action = action.into();
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            self.add(method, template, action.clone())?;
        }
        Ok(self)
    }

    /// Names the most recently added route. Does nothing on an empty router.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        if let Some(route) = self.routes.last_mut() {
            route.name = Some(name.into());
        }
        self
    }

    /// Appends middleware to the most recently added route. Does nothing on an empty router.
    pub fn middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<MiddlewareRef>,
    {
        if let Some(route) = self.routes.last_mut() {
            route.middleware.extend(middleware.into_iter().map(Into::into));
        }
        self
    }

    /// Runs `build` and applies `options` to every route it registered.
    ///
    /// Groups nest: the inner group's options are applied first, so an outer prefix ends up
    /// in front of an inner one and outer middleware run before inner middleware.
    pub fn group<F>(&mut self, options: GroupOptions, build: F) -> Result<&mut Self, PatternError>
    where
        F: FnOnce(&mut Router) -> Result<(), PatternError>,
    {
        let start = self.routes.len();
        if let Err(e) = build(self).and_then(|()| self.apply_group(start, &options)) {
            self.routes.truncate(start);
            return Err(e);
        }
        Ok(self)
    }

    fn apply_group(&mut self, start: usize, options: &GroupOptions) -> Result<(), PatternError> {
        let prefix = options.prefix.as_deref().map(normalize_prefix).filter(|prefix| !prefix.is_empty());
        for route in &mut self.routes[start..] {
            if let Some(prefix) = &prefix {
                route.prefix_with(prefix)?;
            }
            if !options.middleware.is_empty() {
                let own = std::mem::replace(&mut route.middleware, options.middleware.clone());
                route.middleware.extend(own);
            }
            if let (Some(group_name), Some(name)) = (&options.name, &mut route.name) {
                name.insert_str(0, group_name);
            }
        }
        Ok(())
    }

    /// Builds the path of the route named `name`.
    ///
    /// Each parameter replaces its `{key}` or `{key?}` placeholder; optional placeholders
    /// left over are removed together with their `/`. If several routes share the name,
    /// the one registered last wins.
    pub fn url(&self, name: &str, params: &[(&str, &dyn Display)]) -> DispatchResult<String> {
        let route = self.route(name).ok_or_else(|| DispatchError::route_not_named(name))?;

        let mut url = route.template.clone();
        for (key, value) in params {
            let value = value.to_string();
            url = url.replace(&format!("{{{key}}}"), &value).replace(&format!("{{{key}?}}"), &value);
        }

        let url = OPTIONAL_SEGMENT.replace_all(&url, "");
        if url.is_empty() { Ok("/".to_owned()) } else { Ok(url.into_owned()) }
    }

    /// Looks a route up by its (group-prefixed) name.
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.iter().rev().find(|route| route.name.as_deref() == Some(name))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Routes matching `method` and `path`, in registration order, with their captures.
    pub fn matches<'r>(&'r self, method: &'r Method, path: &'r str) -> impl Iterator<Item = (&'r Route, PathParams)> + 'r {
        self.routes.iter().filter_map(move |route| route.matches(method, path).map(|params| (route, params)))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn normalize_method(method: Method) -> Method {
    let upper = method.as_str().to_ascii_uppercase();
    if upper == method.as_str() {
        return method;
    }
    Method::from_bytes(upper.as_bytes()).unwrap_or(method)
}

fn normalize_template(template: &str) -> String {
    format!("/{}", template.trim_start_matches('/'))
}

fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() { String::new() } else { format!("/{prefix}") }
}
