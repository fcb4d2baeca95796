//! Express-style response writer.
//!
//! A [`ResponseWriter`] wraps the pending response for one request. Chained
//! calls (`status`, `set`, `content_type`, cookies) accumulate state without
//! performing I/O; the first terminal call (`json`, `send`, `send_status`,
//! `redirect`, `end`) flushes status and headers into a wire
//! [`Response`] and seals the writer. A second terminal call is a silent
//! no-op — never an error.
//!
//! The writer is a shared handle (`Clone`), so middleware, the matched
//! handler, and the dispatcher all observe the same per-request state.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::http::{Headers, Response, status};

/// The fixed CORS header trio attached to every flushed response,
/// preflight and error responses included.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Methods",
        "GET, POST, PUT, PATCH, DELETE, OPTIONS",
    ),
    (
        "Access-Control-Allow-Headers",
        "Content-Type, Authorization",
    ),
];

/// Attributes for [`ResponseWriter::cookie`].
///
/// `expires` takes a preformatted HTTP date string; the framework does not
/// pull in a date library for the one fixed timestamp it ever writes
/// itself (the epoch, for cookie clearing).
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub expires: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

/// A body value accepted by [`ResponseWriter::send`].
///
/// Structured payloads flush as `application/json`; plain text flushes as
/// `text/plain`. The `From` impls let call sites pass `&str`, `String`, or
/// a [`Value`] directly.
pub enum Payload {
    Text(String),
    Json(Value),
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

// Pending per-request response state. `finished` doubles as the
// headers-sent flag.
struct PendingState {
    status: u16,
    headers: Headers,
    finished: Option<Response>,
}

/// Chainable writer for one outbound response.
///
/// # Examples
///
/// ```
/// use velo::respond::ResponseWriter;
/// use serde_json::json;
///
/// let res = ResponseWriter::new();
/// res.status(201)
///     .set("X-Request-Id", "abc-123")
///     .json(&json!({"id": 42}));
/// assert!(res.headers_sent());
///
/// // double send is a no-op
/// res.status(500).send("too late");
/// ```
#[derive(Clone)]
pub struct ResponseWriter {
    state: Arc<Mutex<PendingState>>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    /// Creates a writer with status 200 and no pending headers.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PendingState {
                status: status::OK,
                headers: Headers::new(),
                finished: None,
            })),
        }
    }

    // Poison-tolerant lock: per-request state is never shared across a
    // panic boundary we care to preserve.
    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the pending status code. Chainable; no I/O happens here.
    pub fn status(&self, code: u16) -> &Self {
        self.lock().status = code;
        self
    }

    /// Merges one pending header, replacing any previous value of the same
    /// name. Chainable.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.lock().headers.set(name, value);
        self
    }

    /// Merges many pending headers at once. Chainable.
    pub fn set_all<I, K, V>(&self, pairs: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.lock();
        for (name, value) in pairs {
            state.headers.set(name, value);
        }
        drop(state);
        self
    }

    /// Reads a pending header previously set on this writer.
    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().headers.get(name).map(str::to_owned)
    }

    /// Sets `Content-Type` from a short extension table; unrecognized names
    /// pass through verbatim as the literal header value. Chainable.
    pub fn content_type(&self, name: &str) -> &Self {
        let mime = match name {
            "html" => "text/html",
            "json" => "application/json",
            "xml" => "application/xml",
            "txt" => "text/plain",
            "css" => "text/css",
            "js" => "application/javascript",
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            other => other,
        };
        self.set("Content-Type", mime)
    }

    /// Appends a `Set-Cookie` entry. Existing cookie entries are kept, so
    /// several cookies can be set on one response. Chainable.
    pub fn cookie(&self, name: &str, value: &str, options: &CookieOptions) -> &Self {
        let cookie = serialize_cookie(name, value, options);
        self.lock().headers.insert("Set-Cookie", cookie);
        self
    }

    /// Appends a cookie-clearing `Set-Cookie` entry: empty value, epoch
    /// expiry, zero max-age. Chainable.
    pub fn clear_cookie(&self, name: &str) -> &Self {
        self.clear_cookie_with(name, &CookieOptions::default())
    }

    /// [`clear_cookie`](Self::clear_cookie) with explicit attributes —
    /// `path`/`domain` must match the original cookie for browsers to drop
    /// it. Expiry attributes in `options` are overridden.
    pub fn clear_cookie_with(&self, name: &str, options: &CookieOptions) -> &Self {
        let cleared = CookieOptions {
            max_age: Some(0),
            expires: Some("Thu, 01 Jan 1970 00:00:00 GMT".to_owned()),
            ..options.clone()
        };
        self.cookie(name, "", &cleared)
    }

    /// Returns `true` once a terminal call has flushed this response.
    pub fn headers_sent(&self) -> bool {
        self.lock().finished.is_some()
    }

    /// The flushed status code, or the pending one if nothing has been
    /// sent yet.
    pub fn status_code(&self) -> u16 {
        let state = self.lock();
        match &state.finished {
            Some(response) => response.status(),
            None => state.status,
        }
    }

    /// Terminal: serializes `value` and flushes it as `application/json`.
    ///
    /// No-op if the response was already sent. A serialization failure is
    /// logged and converted to a generic 500 — it never reaches the client
    /// as a half-written body.
    pub fn json(&self, value: &impl Serialize) {
        match serde_json::to_vec(value) {
            Ok(body) => self.flush(Some("application/json"), body),
            Err(e) => {
                error!(error = %e, "response payload failed to serialize");
                let mut state = self.lock();
                if state.finished.is_none() {
                    state.status = status::INTERNAL_SERVER_ERROR;
                }
                drop(state);
                self.flush(
                    Some("application/json"),
                    br#"{"error":"Internal Server Error"}"#.to_vec(),
                );
            }
        }
    }

    /// Terminal: content-negotiated send. Structured payloads behave like
    /// [`json`](Self::json); text flushes as `text/plain`. No-op after a
    /// prior terminal call.
    pub fn send(&self, payload: impl Into<Payload>) {
        match payload.into() {
            // JSON null coerces to its text form, mirroring how dynamic
            // frameworks treat null as a non-structured value.
            Payload::Json(Value::Null) => self.flush(Some("text/plain"), b"null".to_vec()),
            Payload::Json(value) => self.json(&value),
            Payload::Text(text) => self.flush(Some("text/plain"), text.into_bytes()),
        }
    }

    /// Terminal: sets `code` and sends its canonical reason phrase as a
    /// plain-text body (`"Unknown Status"` for unrecognized codes).
    pub fn send_status(&self, code: u16) {
        self.status(code);
        self.flush(
            Some("text/plain"),
            status::reason_phrase(code).as_bytes().to_vec(),
        );
    }

    /// Terminal: 302 redirect to `url`.
    pub fn redirect(&self, url: &str) {
        self.redirect_with(status::FOUND, url);
    }

    /// Terminal: redirect to `url` with an explicit status code.
    pub fn redirect_with(&self, code: u16, url: &str) {
        {
            let mut state = self.lock();
            if state.finished.is_some() {
                return;
            }
            state.status = code;
            state.headers.set("Location", url);
        }
        self.flush(None, Vec::new());
    }

    /// Terminal: flushes the pending status and headers with an empty body
    /// and no content type.
    pub fn end(&self) {
        self.flush(None, Vec::new());
    }

    /// Consumes the flushed response, leaving the writer sealed but empty.
    /// Returns `None` when no terminal call has happened yet.
    pub(crate) fn take_response(&self) -> Option<Response> {
        self.lock().finished.take()
    }

    // The single flush point every terminal method funnels through.
    //
    // Header precedence, lowest to highest: default content type, fixed
    // CORS trio, then pending headers set by the handler. Multi-valued
    // pending entries (Set-Cookie) survive the merge intact.
    fn flush(&self, content_type: Option<&str>, body: Vec<u8>) {
        let mut state = self.lock();
        if state.finished.is_some() {
            return;
        }

        let mut headers = Headers::new();
        if let Some(ct) = content_type {
            headers.insert("Content-Type", ct);
        }
        for (name, value) in CORS_HEADERS {
            headers.insert(name, value);
        }

        let pending = std::mem::take(&mut state.headers);
        let mut overridden: Vec<String> = Vec::new();
        for (name, value) in pending.iter() {
            let lower = name.to_ascii_lowercase();
            if headers.contains(name) && !overridden.contains(&lower) {
                headers.remove(name);
            }
            overridden.push(lower);
            headers.insert(name, value);
        }

        state.finished = Some(Response::from_parts(state.status, headers, body));
    }
}

/// Serializes one cookie into `Set-Cookie` format.
fn serialize_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{name}={value}");
    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if let Some(expires) = &options.expires {
        cookie.push_str(&format!("; Expires={expires}"));
    }
    if let Some(path) = &options.path {
        cookie.push_str(&format!("; Path={path}"));
    }
    if let Some(domain) = &options.domain {
        cookie.push_str(&format!("; Domain={domain}"));
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if let Some(same_site) = &options.same_site {
        cookie.push_str(&format!("; SameSite={same_site}"));
    }
    cookie
}
