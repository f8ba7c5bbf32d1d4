//! Request handler abstraction.

use std::any::Any;
use std::sync::Arc;

use crate::context::RequestCtx;

/// Anything that can serve a request.
///
/// Handlers are shared across threads once the router is built, so they must
/// be `Send + Sync`. Plain closures taking `&mut RequestCtx` implement this
/// trait, and so does [`Router`](crate::Router) itself, which lets a router be
/// wrapped by [`Instrumented`](crate::middleware::Instrumented).
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut RequestCtx);
}

impl<F> Handler for F
where
    F: Fn(&mut RequestCtx) + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, ctx: &mut RequestCtx) {
        self(ctx)
    }
}

/// Value a panicking handler unwound with.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Callback invoked with the request context and the panic payload when a
/// handler panics during dispatch.
pub type PanicHandler = Arc<dyn Fn(&mut RequestCtx, PanicPayload) + Send + Sync + 'static>;

/// Best-effort text of a panic payload, for logging.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
