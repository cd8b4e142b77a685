// Roost - A modular content management system built with Rust
// Copyright (C) 2025 Roost Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Path routing for the public site.
//!
//! Modules register patterns such as `blog/post/(:str)` or
//! `planning/event/(:int)/cal.ics`. Placeholders capture one parameter each:
//!
//! - `(:int)` digits
//! - `(:str)` slug characters `[a-zA-Z0-9-_]`
//! - `(:any)` anything, slashes included
//!
//! Routes are tried in registration order and the first match wins.
//! Fallback routes are only tried once no ordinary route matched.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(:(int|str|any)\)").expect("placeholder regex is valid"));

struct Route<T> {
    pattern: String,
    regex: Regex,
    target: T,
}

pub struct RouteMatch<'a, T> {
    pub pattern: &'a str,
    pub target: &'a T,
    pub params: Vec<String>,
}

pub struct Router<T> {
    routes: Vec<Route<T>>,
    fallbacks: Vec<Route<T>>,
    rewrite: Option<String>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            fallbacks: Vec::new(),
            rewrite: None,
        }
    }
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, pattern: &str, target: T) -> Result<()> {
        let route = Route::new(pattern, target)?;
        self.routes.push(route);
        Ok(())
    }

    /// Register a catch-all such as `(:str)` that must not shadow the
    /// routes of modules loaded later.
    pub fn fallback(&mut self, pattern: &str, target: T) -> Result<()> {
        let route = Route::new(pattern, target)?;
        self.fallbacks.push(route);
        Ok(())
    }

    /// Dispatch `path` as if it had been requested instead. Used to serve
    /// the homepage from a module slug.
    pub fn change_route(&mut self, path: &str) {
        self.rewrite = Some(normalize(path).to_string());
    }

    pub fn rewritten(&self) -> Option<&str> {
        self.rewrite.as_deref()
    }

    pub fn len(&self) -> usize {
        self.routes.len() + self.fallbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Match `path`, or the rewritten path when `change_route` was called.
    pub fn dispatch(&self, path: &str) -> Option<RouteMatch<'_, T>> {
        let path = self.rewrite.as_deref().unwrap_or_else(|| normalize(path));
        self.routes.iter().chain(&self.fallbacks).find_map(|route| {
            route.regex.captures(path).map(|caps| RouteMatch {
                pattern: &route.pattern,
                target: &route.target,
                params: caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect(),
            })
        })
    }
}

impl<T> Route<T> {
    fn new(pattern: &str, target: T) -> Result<Self> {
        let pattern = normalize(pattern).to_string();
        let regex = compile(&pattern)
            .with_context(|| format!("Failed to compile route pattern '{}'", pattern))?;
        Ok(Self {
            pattern,
            regex,
            target,
        })
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn compile(pattern: &str) -> Result<Regex> {
    let mut source = String::from("^");
    let mut last = 0;
    for caps in PLACEHOLDER_REGEX.captures_iter(pattern) {
        let whole = caps.get(0).context("placeholder without match")?;
        source.push_str(&regex::escape(&pattern[last..whole.start()]));
        source.push_str(match &caps[1] {
            "int" => r"([0-9]+)",
            "str" => r"([a-zA-Z0-9\-_]+)",
            _ => r"(.*)",
        });
        last = whole.end();
    }
    source.push_str(&regex::escape(&pattern[last..]));
    source.push('$');
    Ok(Regex::new(&source)?)
}

/// The `n`-th segment of a request path, counting from zero.
pub fn path_segment(path: &str, n: usize) -> Option<&str> {
    normalize(path).split('/').filter(|s| !s.is_empty()).nth(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn router() -> Router<&'static str> {
        let mut router = Router::new();
        router.route("blog", "index").unwrap();
        router.route("blog/(:int)", "index").unwrap();
        router.route("blog/post/(:str)", "post").unwrap();
        router.route("blog/tag/(:str)/(:int)", "tag").unwrap();
        router.route("planning/cal.ics", "ical").unwrap();
        router.route("(:any)", "page").unwrap();
        router
    }

    #[test]
    fn test_static_and_int_routes() {
        let router = router();
        let m = router.dispatch("/blog").unwrap();
        assert_eq!(*m.target, "index");
        assert!(m.params.is_empty());

        let m = router.dispatch("/blog/3/").unwrap();
        assert_eq!(*m.target, "index");
        assert_eq!(m.params, vec!["3".to_string()]);
    }

    #[test]
    fn test_str_placeholder_rejects_slashes() {
        let router = router();
        let m = router.dispatch("blog/post/hello-world_2").unwrap();
        assert_eq!(*m.target, "post");
        assert_eq!(m.params, vec!["hello-world_2".to_string()]);

        let m = router.dispatch("blog/post/a/b").unwrap();
        assert_eq!(*m.target, "page");
    }

    #[test]
    fn test_multiple_params() {
        let m = router().dispatch("blog/tag/rust/2").map(|m| m.params);
        assert_eq!(m, Some(vec!["rust".to_string(), "2".to_string()]));
    }

    #[test]
    fn test_literal_dots_are_escaped() {
        let router = router();
        assert_eq!(*router.dispatch("planning/cal.ics").unwrap().target, "ical");
        assert_eq!(*router.dispatch("planning/calxics").unwrap().target, "page");
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = Router::new();
        router.route("(:any)", 1).unwrap();
        router.route("blog", 2).unwrap();
        assert_eq!(*router.dispatch("blog").unwrap().target, 1);
    }

    #[test]
    fn test_fallback_comes_after_later_routes() {
        let mut router = Router::new();
        router.fallback("(:str)", "page").unwrap();
        router.route("blog", "blog").unwrap();
        assert_eq!(*router.dispatch("blog").unwrap().target, "blog");
        let m = router.dispatch("about").unwrap();
        assert_eq!(*m.target, "page");
        assert_eq!(m.params, vec!["about".to_string()]);
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_change_route() {
        let mut router = router();
        router.change_route("/blog/");
        let m = router.dispatch("").unwrap();
        assert_eq!(*m.target, "index");
        assert_eq!(router.rewritten(), Some("blog"));
    }

    #[test]
    fn test_no_match() {
        let mut router: Router<()> = Router::new();
        router.route("blog", ()).unwrap();
        assert!(router.dispatch("news").is_none());
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(path_segment("/en/about/", 0), Some("en"));
        assert_eq!(path_segment("/en/about/", 1), Some("about"));
        assert_eq!(path_segment("/", 0), None);
    }
}
