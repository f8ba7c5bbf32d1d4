//! # Router Module
//!
//! Path matching and route resolution.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Registering handlers per method and path pattern, directly or through
//!   prefixed [`Group`]s
//! - Matching incoming requests to registered routes in O(k) time
//! - Extracting path parameters from matched routes
//! - Deciding what to do when nothing matches exactly: redirect, answer
//!   `OPTIONS`, 405 or 404
//!
//! ## Pattern syntax
//!
//! | Syntax | Matches |
//! |--------|---------|
//! | `/users` | the literal path |
//! | `/users/:id`, `/users/{id}` | one non-empty segment |
//! | `/files/*rest`, `/files/{rest:*}` | the rest of the path, including the leading `/` |
//! | `/users/{id?}` | `/users/{id}` and `/users` |
//!
//! Routes that could match the same request are rejected at registration
//! with a [`RouteError`], so every request matches at most one route.
//!
//! ## Example
//!
//! ```rust
//! use http::{Method, StatusCode};
//! use routetree::{Outcome, RequestCtx, Router};
//!
//! # fn main() -> Result<(), routetree::RouteError> {
//! let mut router = Router::new();
//! router.get("/files/*rest", |ctx: &mut RequestCtx| {
//!     let rest = ctx.param("rest").unwrap_or_default().to_owned();
//!     ctx.text(StatusCode::OK, rest);
//! })?;
//!
//! let mut ctx = RequestCtx::new(Method::GET, "/files/a/b");
//! assert_eq!(router.serve(&mut ctx), Outcome::Handled);
//! assert_eq!(ctx.body(), b"/a/b");
//!
//! let mut ctx = RequestCtx::new(Method::POST, "/files/a/b");
//! assert!(matches!(router.serve(&mut ctx), Outcome::MethodNotAllowed { .. }));
//! # Ok(())
//! # }
//! ```

mod core;
mod error;
mod radix;

pub use self::core::{Group, Outcome, ParamVec, RouteMatch, Router, FILEPATH_PARAM, MAX_INLINE_PARAMS};
pub use error::RouteError;
