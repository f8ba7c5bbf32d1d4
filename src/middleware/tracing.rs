use std::time::Duration;

use tracing::{debug, info};

use super::Middleware;
use crate::context::RequestCtx;

/// Logs every request with its matched route, status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, ctx: &mut RequestCtx) -> bool {
        debug!(method = %ctx.method(), path = %ctx.path(), "Request received");
        false
    }

    fn after(&self, ctx: &mut RequestCtx, latency: Duration) {
        info!(
            method = %ctx.method(),
            path = %ctx.path(),
            route = ctx.matched_route().unwrap_or("-"),
            status = ctx.status().as_u16(),
            latency_us = latency.as_micros(),
            "Request completed"
        );
    }
}
