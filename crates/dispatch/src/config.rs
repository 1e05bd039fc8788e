//! Dispatcher settings.
//!
//! `AppConfig` deserializes from any serde source; [`AppConfig::from_env`] covers the
//! usual `APP_*` variables. Loading `.env` or configuration files is left to the host.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_TRACE_DEPTH: usize = 10;

/// Production hides error details from responses, development shows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    #[inline]
    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    /// Only `production` is production; any other environment name shows diagnostics.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("empty runtime mode".to_owned()),
            s if s.eq_ignore_ascii_case("production") => Ok(RuntimeMode::Production),
            _ => Ok(RuntimeMode::Development),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    mode: RuntimeMode,
    mount_path: Option<String>,
    fall_through: bool,
    trace_depth: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { mode: RuntimeMode::Production, mount_path: None, fall_through: true, trace_depth: DEFAULT_TRACE_DEPTH }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `APP_ENV` (default `production`), `APP_MOUNT_PATH` and `APP_FALL_THROUGH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(app_env) = env::var("APP_ENV") {
            match app_env.parse() {
                Ok(mode) => config.mode = mode,
                Err(e) => warn!(app_env = %app_env, cause = %e, "ignore APP_ENV"),
            }
        }

        if let Ok(mount_path) = env::var("APP_MOUNT_PATH") {
            config.mount_path = Some(mount_path).filter(|path| !path.trim_matches('/').is_empty());
        }

        if let Ok(fall_through) = env::var("APP_FALL_THROUGH") {
            match fall_through.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => config.fall_through = true,
                "0" | "false" | "off" | "no" => config.fall_through = false,
                _ => warn!(fall_through = %fall_through, "ignore APP_FALL_THROUGH, expected a boolean"),
            }
        }

        config
    }

    pub fn mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Prefix stripped from every request path before matching, for apps served below `/`.
    pub fn mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = Some(mount_path.into());
        self
    }

    /// Whether a route that produces no reply hands the request to the next matching route.
    pub fn fall_through(mut self, fall_through: bool) -> Self {
        self.fall_through = fall_through;
        self
    }

    /// How many entries of an error's cause chain a development response shows.
    pub fn trace_depth(mut self, trace_depth: usize) -> Self {
        self.trace_depth = trace_depth;
        self
    }

    pub fn runtime_mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn mount(&self) -> Option<&str> {
        self.mount_path.as_deref()
    }

    pub fn falls_through(&self) -> bool {
        self.fall_through
    }

    pub fn max_trace_depth(&self) -> usize {
        self.trace_depth
    }
}

/// Looks up `file.key.path` in the JSON value registered as `config.file`.
///
/// Returns `None` if either the file or a key along the path is missing.
pub(crate) fn lookup<'v>(value: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
    path.split('.').try_fold(value, |current, key| match current {
        serde_json::Value::Object(map) => map.get(key),
        serde_json::Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
