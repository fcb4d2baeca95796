//! # velo
//!
//! An Express-style micro web framework on a from-scratch async HTTP/1.1
//! server: verb-based route registration with `:param` path parameters,
//! lenient JSON body parsing, and a chainable response writer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use velo::{App, RequestContext, ResponseWriter};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), velo::ServerError> {
//!     let mut app = App::new();
//!
//!     app.get("/users/:id", |ctx: RequestContext, res: ResponseWriter| async move {
//!         let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!         res.json(&json!({"id": id}));
//!         Ok(())
//!     });
//!
//!     app.listen(3000).await
//! }
//! ```

pub mod app;
pub mod body;
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod respond;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use context::{Params, RequestContext};
pub use error::HandlerError;
pub use http::{Headers, Method, Request, Response, status};
pub use middleware::{Middleware, MiddlewareFn, Next, RequestLogger, from_middleware};
pub use respond::{CookieOptions, Payload, ResponseWriter};
pub use router::{Handler, IntoHandler, Router};
pub use server::{Server, ServerError};
