//! Route patterns and the per-method route table.
//!
//! Patterns contain literal segments and `:name` parameter segments:
//!
//! | Pattern            | Example match   | Captured params |
//! |--------------------|-----------------|-----------------|
//! | `/users`           | `/users`        | *(none)*        |
//! | `/users/:id`       | `/users/42`     | `id → "42"`     |
//!
//! A `:name` segment matches exactly one non-empty run of non-`/`
//! characters. There is no prefix matching and no normalization: a
//! trailing slash is a distinct path, and literal segments compare
//! case-sensitively. Captured values are handed over raw — any URL
//! decoding is the caller's business.
//!
//! Routes are matched in registration order; the first pattern that
//! structurally matches the incoming path wins, which makes registration
//! order an explicit priority. Re-registering an existing
//! (method, pattern) pair silently swaps the handler without moving the
//! route in that order.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Params, RequestContext};
use crate::error::HandlerError;
use crate::http::Method;
use crate::respond::ResponseWriter;

/// Boxed future returned by type-erased handlers and middleware.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Type-erased, heap-allocated async route handler.
///
/// Handlers receive the per-request [`RequestContext`] and the shared
/// [`ResponseWriter`], and report failures through their `Result` — the
/// dispatcher converts any `Err` to a 500. You rarely construct this type
/// directly; the `App` verb methods accept any [`IntoHandler`].
pub type Handler =
    Arc<dyn Fn(RequestContext, ResponseWriter) -> BoxFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(RequestContext, ResponseWriter) -> impl Future<Output =
/// Result<(), HandlerError>> + Send` that is also `Send + Sync + 'static`
/// implements this automatically via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler, boxing the returned future.
    fn call(&self, ctx: RequestContext, res: ResponseWriter) -> BoxFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(RequestContext, ResponseWriter) -> F + Send + Sync + 'static,
    F: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext, res: ResponseWriter) -> BoxFuture {
        Box::pin((self)(ctx, res))
    }
}

// A single path segment of a compiled pattern.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Compiled representation of a route pattern string.
///
/// Splitting is purely on `/`; the segment count of the compiled pattern
/// equals the number of `/`-delimited tokens in the original string, so
/// `/users` and `/users/` compile to different patterns.
#[derive(Debug, Clone)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles a pattern string into its segment sequence.
    pub fn compile(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|token| match token.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(token.to_owned()),
            })
            .collect();
        Self { segments }
    }

    /// Tries to match `path` against this pattern.
    ///
    /// Returns the captured parameters in pattern-declaration order on
    /// success, `None` on a structural mismatch. A failed match is an
    /// ordinary outcome, not an error.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut tokens = path.split('/');
        let mut params = Params::new();

        for segment in &self.segments {
            let token = tokens.next()?;
            match segment {
                Segment::Literal(expected) => {
                    if expected != token {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    // a parameter never captures an empty segment
                    if token.is_empty() {
                        return None;
                    }
                    params.push(name.clone(), token);
                }
            }
        }

        // equal segment count required: the path must be exhausted too
        if tokens.next().is_some() {
            return None;
        }

        Some(params)
    }
}

// One registered route: the raw pattern string (identity for overwrite),
// its compiled form, and the handler.
struct Route {
    pattern: String,
    compiled: Pattern,
    handler: Handler,
}

/// Per-method, insertion-ordered route table.
///
/// Owned by the `App` and constructed before the listening socket opens;
/// dispatch only ever reads it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use velo::http::Method;
/// use velo::router::{Handler, Router};
///
/// let noop: Handler = Arc::new(|_ctx, res| {
///     Box::pin(async move {
///         res.end();
///         Ok(())
///     })
/// });
///
/// let mut router = Router::new();
/// router.register(Method::Get, "/users/:id", Arc::clone(&noop));
///
/// let (_, params) = router.lookup(&Method::Get, "/users/42").unwrap();
/// assert_eq!(params.get("id"), Some("42"));
/// assert!(router.lookup(&Method::Post, "/users/42").is_none());
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` + `pattern`.
    ///
    /// Re-registering the same (method, pattern) replaces the previous
    /// handler in place — silently, and without changing the route's
    /// position in the lookup order.
    pub fn register(&mut self, method: Method, pattern: &str, handler: Handler) {
        let routes = self.routes.entry(method).or_default();
        match routes.iter_mut().find(|route| route.pattern == pattern) {
            Some(route) => route.handler = handler,
            None => routes.push(Route {
                pattern: pattern.to_owned(),
                compiled: Pattern::compile(pattern),
                handler,
            }),
        }
    }

    /// Resolves `method` + `path` to the first matching route.
    ///
    /// Candidates are tried in registration order. An unknown method and a
    /// path that matches nothing are the same outcome: `None`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Handler, Params)> {
        self.routes.get(method)?.iter().find_map(|route| {
            route
                .compiled
                .matches(path)
                .map(|params| (Arc::clone(&route.handler), params))
        })
    }

    /// Total number of registered routes across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Returns `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Arc::new(|_ctx, res| {
            Box::pin(async move {
                res.end();
                Ok(())
            })
        })
    }

    // ── Pattern::compile ─────────────────────────────────────────────────

    #[test]
    fn compile_counts_slash_delimited_tokens() {
        let pat = Pattern::compile("/users/:id");
        assert_eq!(pat.segments.len(), 3); // "", "users", ":id"
        assert_eq!(pat.segments[0], Segment::Literal(String::new()));
        assert_eq!(pat.segments[1], Segment::Literal("users".to_owned()));
        assert_eq!(pat.segments[2], Segment::Param("id".to_owned()));
    }

    #[test]
    fn compile_trailing_slash_is_distinct() {
        let with = Pattern::compile("/users/");
        let without = Pattern::compile("/users");
        assert_eq!(with.segments.len(), 3);
        assert_eq!(without.segments.len(), 2);
    }

    // ── Pattern::matches ─────────────────────────────────────────────────

    #[test]
    fn literal_match() {
        let pat = Pattern::compile("/users");
        assert!(pat.matches("/users").is_some());
        assert!(pat.matches("/posts").is_none());
    }

    #[test]
    fn literal_match_is_case_sensitive() {
        let pat = Pattern::compile("/Users");
        assert!(pat.matches("/Users").is_some());
        assert!(pat.matches("/users").is_none());
    }

    #[test]
    fn root_matches_only_root() {
        let pat = Pattern::compile("/");
        assert!(pat.matches("/").is_some());
        assert!(pat.matches("/users").is_none());
    }

    #[test]
    fn param_captures_segment() {
        let pat = Pattern::compile("/users/:id");
        let params = pat.matches("/users/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn multiple_params_in_declaration_order() {
        let pat = Pattern::compile("/users/:user_id/posts/:post_id");
        let params = pat.matches("/users/7/posts/99").unwrap();
        let names: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["user_id", "post_id"]);
        assert_eq!(params.get("user_id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
    }

    #[test]
    fn segment_count_must_match() {
        let pat = Pattern::compile("/users/:id");
        assert!(pat.matches("/users").is_none());
        assert!(pat.matches("/users/42/extra").is_none());
    }

    #[test]
    fn param_rejects_empty_segment() {
        let pat = Pattern::compile("/users/:id");
        // "/users/" splits to a trailing empty token, which :id must not capture
        assert!(pat.matches("/users/").is_none());
    }

    #[test]
    fn trailing_slash_does_not_match_bare_pattern() {
        let pat = Pattern::compile("/users");
        assert!(pat.matches("/users/").is_none());
    }

    #[test]
    fn param_does_not_span_slashes() {
        let pat = Pattern::compile("/files/:name");
        assert!(pat.matches("/files/docs/readme.txt").is_none());
    }

    #[test]
    fn captured_value_is_raw() {
        let pat = Pattern::compile("/users/:id");
        let params = pat.matches("/users/jane%20doe").unwrap();
        assert_eq!(params.get("id"), Some("jane%20doe"));
    }

    // ── Router ───────────────────────────────────────────────────────────

    #[test]
    fn starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn lookup_unknown_method_is_none() {
        let mut router = Router::new();
        router.register(Method::Get, "/users", noop());
        assert!(router.lookup(&Method::Post, "/users").is_none());
    }

    #[test]
    fn lookup_unmatched_path_is_none() {
        let mut router = Router::new();
        router.register(Method::Get, "/users", noop());
        assert!(router.lookup(&Method::Get, "/posts").is_none());
    }

    #[test]
    fn registration_order_is_priority() {
        let mut router = Router::new();
        router.register(Method::Get, "/a/:x", noop());
        router.register(Method::Get, "/a/b", noop());

        // both patterns fit "/a/b"; the one registered first wins
        let (_, params) = router.lookup(&Method::Get, "/a/b").unwrap();
        assert_eq!(params.get("x"), Some("b"));
    }

    #[test]
    fn literal_first_when_registered_first() {
        let mut router = Router::new();
        router.register(Method::Get, "/a/b", noop());
        router.register(Method::Get, "/a/:x", noop());

        let (_, params) = router.lookup(&Method::Get, "/a/b").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut router = Router::new();
        router.register(Method::Get, "/a/:x", noop());
        router.register(Method::Get, "/a/b", noop());
        // overwrite the first pattern; it must keep its priority slot
        router.register(Method::Get, "/a/:x", noop());

        assert_eq!(router.len(), 2);
        let (_, params) = router.lookup(&Method::Get, "/a/b").unwrap();
        assert_eq!(params.get("x"), Some("b"));
    }

    #[test]
    fn methods_are_isolated() {
        let mut router = Router::new();
        router.register(Method::Get, "/r", noop());
        router.register(Method::Put, "/r", noop());
        router.register(Method::Delete, "/r", noop());
        assert_eq!(router.len(), 3);
        assert!(router.lookup(&Method::Put, "/r").is_some());
        assert!(router.lookup(&Method::Patch, "/r").is_none());
    }
}
