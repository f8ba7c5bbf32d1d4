//! # routetree
//!
//! **routetree** is a radix-tree request router: given a method and a URL
//! path it finds the registered handler, extracts path parameters, and
//! decides what to answer when nothing matches exactly.
//!
//! ## Architecture
//!
//! - **[`path`]** - Path cleaning and optional-segment expansion
//! - **[`router`]** - Per-method radix trees, route groups and the dispatch
//!   policy (redirects, `OPTIONS`, 405, 404, panic recovery)
//! - **[`context`]** - The per-request [`RequestCtx`]
//! - **[`middleware`]** - Pipelines around a handler: Prometheus histogram,
//!   request logging
//! - **[`static_files`]** - File serving behind a catch-all route
//! - **[`runtime_config`]** - Dispatch policy switches, from the environment
//!   or a config file
//! - **[`logging`]** - `tracing-subscriber` setup for binaries
//!
//! The router never opens sockets. Adapt whatever server you use by turning
//! its request into a [`RequestCtx`] (see [`RequestCtx::from_request`]) and
//! the context back into a response.
//!
//! ## Quick start
//!
//! ```rust
//! use http::{Method, StatusCode};
//! use routetree::{Outcome, RequestCtx, Router};
//!
//! # fn main() -> Result<(), routetree::RouteError> {
//! let mut router = Router::new();
//! router.get("/health", |ctx: &mut RequestCtx| ctx.text(StatusCode::OK, "ok"))?;
//!
//! let mut api = router.group("/api/v1");
//! api.get("/users/{id?}", |ctx: &mut RequestCtx| {
//!     let body = ctx.param("id").unwrap_or("all").to_owned();
//!     ctx.text(StatusCode::OK, body);
//! })?;
//!
//! let mut ctx = RequestCtx::new(Method::GET, "/api/v1/users");
//! assert_eq!(router.serve(&mut ctx), Outcome::Handled);
//! assert_eq!(ctx.body(), b"all");
//!
//! let mut ctx = RequestCtx::new(Method::GET, "/HEALTH");
//! assert!(matches!(router.serve(&mut ctx), Outcome::Redirect { .. }));
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod path;
pub mod router;
pub mod runtime_config;
pub mod static_files;

pub use context::RequestCtx;
pub use handler::{Handler, PanicHandler, PanicPayload};
pub use router::{Group, Outcome, ParamVec, RouteError, RouteMatch, Router};
pub use runtime_config::RouterConfig;
