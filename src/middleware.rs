//! Continuation-passing middleware pipeline.
//!
//! Middleware runs strictly in registration order, app-level wrappers before
//! router-level ones. Each wrapper either applies to every request (empty
//! path) or only to requests whose path equals its own exactly; there is no
//! prefix matching. A middleware that never invokes its continuation
//! short-circuits the rest of the chain, including the terminal handler.

use crate::request::Req;
use crate::response::Res;
use std::sync::Arc;

/// Terminal request handler.
pub type Handler = Arc<dyn Fn(&mut Req, &mut Res) + Send + Sync>;

/// A middleware function. Call `next.run(req, res)` to continue the chain;
/// `Next` is consumed by value, so the continuation can run at most once.
pub type Middleware = Arc<dyn Fn(&mut Req, &mut Res, Next) + Send + Sync>;

/// A registered middleware plus the path it is scoped to.
///
/// An empty path applies to every request; a non-empty path applies iff the
/// request path equals it exactly.
#[derive(Clone)]
pub struct MiddlewareWrapper {
    pub path: String,
    pub handler: Middleware,
}

/// The continuation handed to each middleware.
///
/// Walks the effective wrapper sequence by index, skipping wrappers whose
/// path does not apply, and invokes the terminal handler once the sequence is
/// exhausted.
pub struct Next {
    wrappers: Vec<MiddlewareWrapper>,
    index: usize,
    handler: Handler,
}

impl Next {
    pub(crate) fn new(wrappers: Vec<MiddlewareWrapper>, handler: Handler) -> Self {
        Next {
            wrappers,
            index: 0,
            handler,
        }
    }

    /// Advance to the next applicable middleware, or the terminal handler.
    pub fn run(mut self, req: &mut Req, res: &mut Res) {
        while self.index < self.wrappers.len() {
            let wrapper = self.wrappers[self.index].clone();
            self.index += 1;

            if wrapper.path.is_empty() || wrapper.path == req.path {
                return (wrapper.handler)(req, res, self);
            }
        }

        (self.handler)(req, res)
    }
}
