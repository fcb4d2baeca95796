//! The application value: route registration, middleware, and dispatch.
//!
//! An [`App`] owns the route table and middleware chain outright — there is
//! no process-wide registry. Registration happens on `&mut self` before the
//! app is handed to the server; [`App::listen`] consumes the value, so
//! registering after the socket opens is impossible by construction.
//!
//! Dispatch runs a fixed state machine per request:
//!
//! 1. **Preflight** — `OPTIONS` is answered immediately with the CORS
//!    headers and an empty 200; no route lookup happens.
//! 2. **Route lookup** — first match in registration order, else 404.
//! 3. **Body parse** — POST/PUT/PATCH bodies decode leniently; a malformed
//!    body degrades to `{}` and never aborts dispatch.
//! 4. **Middleware chain, then handler** — any `Err` is converted here:
//!    500 with a generic body if nothing was flushed, a log line otherwise.
//! 5. **Terminal** — if the handler finished without flushing, the pending
//!    status goes out with an empty body so the exchange always completes.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use crate::body;
use crate::context::RequestContext;
use crate::http::{Method, Request, Response, status};
use crate::middleware::{Middleware, MiddlewareFn, Next, from_middleware};
use crate::respond::ResponseWriter;
use crate::router::{Handler, IntoHandler, Router};
use crate::server::{Server, ServerError};

/// An Express-style application: verb-based registration plus dispatch.
///
/// # Examples
///
/// ```rust,no_run
/// use velo::{App, RequestContext, ResponseWriter};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), velo::ServerError> {
///     let mut app = App::new();
///
///     app.get("/users/:id", |ctx: RequestContext, res: ResponseWriter| async move {
///         let id = ctx.param("id").unwrap_or("unknown").to_owned();
///         res.json(&json!({"id": id}));
///         Ok(())
///     });
///
///     app.listen(3000).await
/// }
/// ```
#[derive(Default)]
pub struct App {
    router: Router,
    middlewares: Vec<MiddlewareFn>,
}

impl App {
    /// Creates an app with no routes and no middleware.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.route(Method::Get, path, handler);
    }

    /// Registers a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.route(Method::Post, path, handler);
    }

    /// Registers a handler for `PUT` requests matching `path`.
    pub fn put(&mut self, path: &str, handler: impl IntoHandler) {
        self.route(Method::Put, path, handler);
    }

    /// Registers a handler for `PATCH` requests matching `path`.
    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) {
        self.route(Method::Patch, path, handler);
    }

    /// Registers a handler for `DELETE` requests matching `path`.
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.route(Method::Delete, path, handler);
    }

    // Erase the concrete handler type and hand it to the route table.
    fn route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx, res| handler.call(ctx, res));
        self.router.register(method, path, handler);
    }

    /// Appends `middleware` to the chain. Layers run in registration order
    /// around every matched handler (preflight and 404 skip the chain).
    pub fn middleware<M>(&mut self, middleware: M)
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
    }

    /// Appends an already type-erased middleware function.
    pub fn middleware_fn(&mut self, middleware: MiddlewareFn) {
        self.middlewares.push(middleware);
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Handles one parsed request end to end and returns the wire response.
    ///
    /// This is the dispatcher: every application-level failure inside it is
    /// recoverable and becomes a response — nothing escapes to the caller.
    pub async fn dispatch(&self, request: Request) -> Response {
        let writer = ResponseWriter::new();

        // CORS preflight bypasses routing entirely
        if request.method() == &Method::Options {
            writer.end();
            return Self::take(&writer);
        }

        let Some((handler, params)) = self.router.lookup(request.method(), request.path()) else {
            writer
                .status(status::NOT_FOUND)
                .json(&json!({"error": "Not Found"}));
            return Self::take(&writer);
        };

        let body = if request.method().expects_body() {
            body::decode_lenient(request.body())
        } else {
            body::empty_object()
        };

        let method = request.method().clone();
        let path = request.path().to_owned();
        let ctx = RequestContext::new(request, params, body);
        let chain = Next::new(self.middlewares.clone(), handler);

        if let Err(e) = chain.run(ctx, writer.clone()).await {
            if writer.headers_sent() {
                // too late for the client; whatever was flushed stands
                error!(%method, %path, error = %e, "handler failed after response flush");
            } else {
                error!(%method, %path, error = %e, "handler failed");
                writer
                    .status(status::INTERNAL_SERVER_ERROR)
                    .json(&json!({"error": "Internal Server Error"}));
            }
        }

        Self::take(&writer)
    }

    // Extract the flushed response; a handler that never terminated gets
    // its pending status flushed with an empty body so the client is not
    // left hanging on the socket.
    fn take(writer: &ResponseWriter) -> Response {
        match writer.take_response() {
            Some(response) => response,
            None => {
                debug!("handler completed without terminating the response");
                writer.end();
                writer
                    .take_response()
                    .unwrap_or_else(|| Response::new(status::OK))
            }
        }
    }

    /// Binds `0.0.0.0:port` and serves this app until the process exits.
    ///
    /// Consumes the app: all registration must happen before listening.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the port cannot be bound, or
    /// [`ServerError::Io`] if the listener fails later.
    pub async fn listen(self, port: u16) -> Result<(), ServerError> {
        let server = Server::bind(format!("0.0.0.0:{port}")).await?;
        server.serve(self).await
    }
}
