//! Middleware pipeline — ordered before/after logic around route handlers.
//!
//! Middleware runs between route lookup and the matched handler. Each layer
//! receives the request context, the shared response writer, and a [`Next`]
//! cursor into the remainder of the chain; the chain terminates at the
//! matched route handler. A layer may:
//!
//! - **Pass through** — `next.run(ctx, res).await`.
//! - **Short-circuit** — flush a response on `res` and return `Ok(())`
//!   without calling `next`.
//! - **Abort** — return `Err(HandlerError)`; the dispatcher converts it to
//!   a 500 (this is the explicit-result replacement for a `next(err)`
//!   callback).
//! - **Decorate** — run `next` first, then inspect `res` (status, headers)
//!   afterwards, as [`RequestLogger`] does.

use std::sync::Arc;

use tokio::time::Instant;

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::respond::ResponseWriter;
use crate::router::{BoxFuture, Handler};

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the chain is stored as a `MiddlewareFn`; the [`Arc`]
/// makes entries cheap to clone as [`Next`] advances. Wrap a closure
/// directly, or a [`Middleware`] impl via [`from_middleware`].
pub type MiddlewareFn =
    Arc<dyn Fn(RequestContext, ResponseWriter, Next) -> BoxFuture + Send + Sync + 'static>;

/// The core trait for velo middleware.
///
/// Implementations must be `Send + Sync` — the chain is shared across
/// connection tasks — and `handle` must return a pinned `Send` future.
///
/// # Examples
///
/// ```rust,no_run
/// use velo::middleware::{Middleware, Next};
/// use velo::router::BoxFuture;
/// use velo::{RequestContext, ResponseWriter};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: RequestContext, res: ResponseWriter, next: Next) -> BoxFuture {
///         Box::pin(async move { next.run(ctx, res).await })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the rest of the chain.
    fn handle(&self, ctx: RequestContext, res: ResponseWriter, next: Next) -> BoxFuture;
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareFn`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareFn
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx, res, next| middleware.handle(ctx, res, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Next::run), so it cannot be invoked twice
/// from the same layer. When the chain is exhausted, `run` invokes the
/// matched route handler.
pub struct Next {
    chain: Vec<MiddlewareFn>,
    // which middleware to invoke on the next `run` call
    index: usize,
    endpoint: Handler,
}

impl Next {
    /// Creates a cursor positioned at the start of `chain`, ending at
    /// `endpoint` (the matched route handler).
    pub fn new(chain: Vec<MiddlewareFn>, endpoint: Handler) -> Self {
        Self {
            chain,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next layer in the chain, or the route handler once the
    /// chain is exhausted.
    pub async fn run(
        mut self,
        ctx: RequestContext,
        res: ResponseWriter,
    ) -> Result<(), HandlerError> {
        if self.index < self.chain.len() {
            let layer = Arc::clone(&self.chain[self.index]);
            self.index += 1;
            layer(ctx, res, self).await
        } else {
            (self.endpoint)(ctx, res).await
        }
    }
}

/// Built-in middleware that logs each request's method, path, status, and
/// duration as a single `tracing::info!` line after the downstream layers
/// complete. Never short-circuits.
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(&self, ctx: RequestContext, res: ResponseWriter, next: Next) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_owned();
            let path = ctx.request().path().to_owned();

            let result = next.run(ctx, res.clone()).await;

            let duration = start.elapsed();
            tracing::info!("{} {} - {} ({:?})", method, path, res.status_code(), duration);

            result
        })
    }
}
