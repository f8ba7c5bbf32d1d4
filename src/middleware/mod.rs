//! Request instrumentation.
//!
//! [`Instrumented`] wraps any [`Handler`](crate::Handler), usually the
//! router, and runs a pipeline of [`Middleware`] around it.

mod core;
mod metrics;
mod tracing;

pub use self::core::{Instrumented, Middleware};
pub use self::metrics::{
    PrometheusMiddleware, DEFAULT_METRICS_PATH, DURATION_BUCKETS, UNMATCHED_PATH_LABEL,
};
pub use self::tracing::TracingMiddleware;
