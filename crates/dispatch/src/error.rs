use crate::container::Key;
use http::{Method, StatusCode};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

// Alias so thiserror does not treat the field as a provided backtrace (nightly-only API).
type CapturedBacktrace = Backtrace;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("invalid route action: {reason}")]
    InvalidAction { reason: String },

    #[error("invalid middleware: {reason}")]
    InvalidMiddleware { reason: String },

    #[error("no route named {name}")]
    RouteNotNamed { name: String },

    #[error("can't extract handler argument: {reason}")]
    Extract { reason: String },

    #[error(transparent)]
    Container {
        #[from]
        source: ContainerError,
    },

    #[error(transparent)]
    Pattern {
        #[from]
        source: PatternError,
    },

    /// A failure raised by application code. The stack is captured where it was created.
    #[error("{source}")]
    Handler {
        #[source]
        source: Box<dyn Error + Send + Sync>,
        backtrace: CapturedBacktrace,
    },
}

impl DispatchError {
    pub fn route_not_found(method: Method, path: impl Into<String>) -> Self {
        Self::RouteNotFound { method, path: path.into() }
    }

    pub fn invalid_action<S: ToString>(str: S) -> Self {
        Self::InvalidAction { reason: str.to_string() }
    }

    /// The controller was resolved but has no method with the given name.
    pub fn unknown_method(controller: &str, method: &str) -> Self {
        Self::InvalidAction { reason: format!("{controller} has no method named '{method}'") }
    }

    pub fn invalid_middleware<S: ToString>(str: S) -> Self {
        Self::InvalidMiddleware { reason: str.to_string() }
    }

    pub fn route_not_named(name: impl Into<String>) -> Self {
        Self::RouteNotNamed { name: name.into() }
    }

    pub fn extract<S: ToString>(str: S) -> Self {
        Self::Extract { reason: str.to_string() }
    }

    pub fn handler<E: Into<Box<dyn Error + Send + Sync>>>(e: E) -> Self {
        Self::Handler { source: e.into(), backtrace: Backtrace::force_capture() }
    }

    /// The status code this failure is surfaced with. Only an unmatched request is a 404,
    /// everything raised by a matched route is a server error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The stack captured when the error was created, if any.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            Self::Handler { backtrace, .. } if backtrace.status() == BacktraceStatus::Captured => Some(backtrace),
            _ => None,
        }
    }
}

impl From<Box<dyn Error + Send + Sync>> for DispatchError {
    fn from(source: Box<dyn Error + Send + Sync>) -> Self {
        Self::handler(source)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::handler(e)
    }
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("unresolvable type: {key}")]
    UnresolvableType { key: Key },

    #[error("cyclic dependency detected: {}", display_cycle(.cycle))]
    CyclicDependency { cycle: Vec<Key> },

    #[error("value registered under {key} is not a {expected}")]
    TypeMismatch { key: Key, expected: &'static str },

    #[error("failed to construct {key}: {source}")]
    Construction {
        key: Key,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl ContainerError {
    pub fn unresolvable(key: impl Into<Key>) -> Self {
        Self::UnresolvableType { key: key.into() }
    }

    pub fn type_mismatch(key: impl Into<Key>, expected: &'static str) -> Self {
        Self::TypeMismatch { key: key.into(), expected }
    }

    /// Wraps a failure raised by user construction code, e.g. a factory that opens a file.
    pub fn construction<E: Into<Box<dyn Error + Send + Sync>>>(key: impl Into<Key>, e: E) -> Self {
        Self::Construction { key: key.into(), source: e.into() }
    }
}

fn display_cycle(cycle: &[Key]) -> String {
    cycle.iter().map(Key::as_str).collect::<Vec<_>>().join(" -> ")
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid route template '{template}': {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },
}

impl PatternError {
    pub fn invalid_template(template: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidTemplate { template: template.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContainerError, DispatchError};
    use crate::container::Key;
    use http::{Method, StatusCode};

    #[test]
    fn cycle_is_rendered_as_a_path() {
        let err = ContainerError::CyclicDependency { cycle: vec![Key::from("a"), Key::from("b"), Key::from("a")] };
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> b -> a");
    }

    #[test]
    fn status_codes() {
        assert_eq!(DispatchError::route_not_found(Method::GET, "/x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(DispatchError::extract("bad id").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(DispatchError::invalid_action("nope").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            DispatchError::from(ContainerError::unresolvable("Foo")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn handler_error_keeps_message() {
        let err = DispatchError::handler("database is gone");
        assert_eq!(err.to_string(), "database is gone");
        assert!(err.backtrace().is_some());
        assert!(DispatchError::invalid_action("nope").backtrace().is_none());
    }
}
