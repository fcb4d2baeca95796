//! Per-request context handed to middleware and handlers.
//!
//! A [`RequestContext`] is built once per dispatch and bundles the parsed
//! [`Request`] with everything the router and body reader derived from it:
//! path parameters, query access, and the leniently parsed JSON body. It
//! replaces the dynamic `req.params = ...` property injection of
//! prototype-based frameworks with an explicit composite value.

use serde_json::Value;

use crate::body::BodyError;
use crate::http::Request;

/// Path parameters captured by the matched route pattern.
///
/// Backed by a small ordered list so parameters come out in
/// pattern-declaration order. Lookups are linear, which is the right trade
/// for the handful of parameters a route realistically carries.
///
/// # Examples
///
/// ```
/// use velo::context::Params;
///
/// let mut params = Params::new();
/// params.push("id", "42");
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a captured parameter. Declaration order is preserved.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the value captured for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of captured parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the matched pattern had no `:name` segments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything a handler gets to see about one request.
pub struct RequestContext {
    request: Request,
    params: Params,
    body: Value,
}

impl RequestContext {
    /// Builds a context from a parsed request, the route's captured
    /// parameters, and the leniently decoded body.
    pub fn new(request: Request, params: Params, body: Value) -> Self {
        Self {
            request,
            params,
            body,
        }
    }

    /// The underlying parsed request (headers, raw body, cookies, query).
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Path parameters captured by the matched pattern.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for a single path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// First query value for `key`, if present.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.request.query(key)
    }

    /// The request body as leniently parsed JSON: `{}` for empty or
    /// malformed bodies, and for verbs that carry no body at all.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Strictly deserializes the raw request body into `T`.
    ///
    /// Unlike [`body`](Self::body), this does not degrade on malformed
    /// input: handlers that require valid JSON call this and map the error
    /// to a 400 themselves. An empty body is decoded as `{}` first so that
    /// `T`s with all-optional fields still deserialize.
    ///
    /// # Errors
    ///
    /// [`BodyError::Decode`] when the body is not valid JSON or does not
    /// match `T`'s shape.
    pub fn json<T>(&self) -> Result<T, BodyError>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.request.body();
        if bytes.is_empty() {
            return serde_json::from_value(Value::Object(serde_json::Map::new()))
                .map_err(BodyError::Decode);
        }
        serde_json::from_slice(bytes).map_err(BodyError::Decode)
    }
}
