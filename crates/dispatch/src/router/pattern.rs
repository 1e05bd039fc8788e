//! Route template compilation.
//!
//! A template is made of literal text and placeholders:
//!
//! - `{name}` is required and matches one path segment (no `/` inside);
//! - `{name?}` is optional and only well-formed as a trailing segment. An optional
//!   placeholder followed by more literal text still compiles, but the literal text may then
//!   be swallowed by the capture.
//!
//! The `/` in front of a placeholder belongs to it, so `/posts/{id?}` matches both `/posts`
//! and `/posts/5`. Matching is anchored at both ends and accepts one trailing `/`.

use crate::error::PatternError;
use crate::request::PathParams;
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/?)\{(\w+)(\?)?\}").expect("placeholder pattern is a valid regex"));

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct Pattern {
    template: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `template` into an anchored matcher.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let trimmed = template.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };

        let mut source = String::with_capacity(trimmed.len() * 2 + 8);
        source.push('^');

        let mut last = 0;
        for captures in PLACEHOLDER.captures_iter(trimmed) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
                continue;
            };
            source.push_str(&regex::escape(&trimmed[last..whole.start()]));

            let slash = if captures.get(1).is_some_and(|m| !m.is_empty()) { "/" } else { "" };
            let name = name.as_str();
            if captures.get(3).is_some() {
                source.push_str(&format!("(?:{slash}(?P<{name}>[^/]+))?"));
            } else {
                source.push_str(&format!("{slash}(?P<{name}>[^/]+)"));
            }

            last = whole.end();
        }
        source.push_str(&regex::escape(&trimmed[last..]));
        source.push_str("/?$");

        let regex = Regex::new(&source).map_err(|e| PatternError::invalid_template(template, e))?;
        Ok(Self { template: trimmed.to_owned(), regex })
    }

    /// Matches `path`, returning the named captures that took part in the match.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;

        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| captures.name(name).map(|m| (name.to_owned(), m.as_str().to_owned())))
            .collect::<Vec<_>>();

        Some(PathParams::from(params))
    }

    #[inline]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The template this pattern was compiled from, without its trailing `/`.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The generated regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Names of all placeholders, in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.regex.capture_names().flatten()
    }
}
