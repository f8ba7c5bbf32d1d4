use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::context::RequestCtx;
use crate::handler::Handler;

/// Hook run around a wrapped handler by [`Instrumented`].
pub trait Middleware: Send + Sync {
    /// Called before the wrapped handler. Return `true` after writing a
    /// response to skip the handler.
    fn before(&self, _ctx: &mut RequestCtx) -> bool {
        false
    }

    /// Called after the handler, or after the early response, with the time
    /// spent in the handler (zero when it was skipped).
    fn after(&self, _ctx: &mut RequestCtx, _latency: Duration) {}
}

/// A handler wrapped in an ordered middleware pipeline
///
/// Usually the inner handler is the [`Router`](crate::Router), so the
/// measured latency covers routing, redirects and fallbacks alike.
pub struct Instrumented<H> {
    inner: H,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl<H: Handler> Instrumented<H> {
    /// Wrap `inner` in an empty pipeline
    #[must_use]
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            middlewares: Vec::new(),
        }
    }

    /// Add middleware to the pipeline
    ///
    /// `before` hooks run in the order middleware was added, and so do the
    /// `after` hooks.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    #[must_use]
    pub fn with(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.add_middleware(mw);
        self
    }

    /// The wrapped handler
    #[must_use]
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: Handler> Handler for Instrumented<H> {
    fn handle(&self, ctx: &mut RequestCtx) {
        let mut early = false;
        for (idx, mw) in self.middlewares.iter().enumerate() {
            if mw.before(ctx) && !early {
                early = true;
                debug!(
                    middleware_idx = idx,
                    middleware_name = std::any::type_name_of_val(mw.as_ref()),
                    "Middleware returned early response"
                );
            }
        }

        let latency = if early {
            Duration::ZERO
        } else {
            let start = Instant::now();
            self.inner.handle(ctx);
            start.elapsed()
        };

        for mw in &self.middlewares {
            mw.after(ctx, latency);
        }
    }
}
