//! Pipeline handler kinds.
//!
//! A route's pipeline is an ordered sequence of three kinds of step:
//!
//! - **Middleware** mutates the per-request context and produces nothing.
//! - **Controllers** are async and produce the item's result (or an error).
//! - **Afterware** observes a failed item (metrics, logging); it runs only
//!   once an error is set and cannot alter the outcome.
//!
//! The kinds are explicit variants rather than anything inferred at runtime,
//! so a pipeline's composition is checked where it is built.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::BlestError;
use crate::selector::JsonMap;

/// Outcome of a controller: at most one value, or a handler error.
pub type ControllerOutput = Result<Option<Value>, BlestError>;

type MiddlewareFn = dyn Fn(&JsonMap, &mut JsonMap) + Send + Sync;
type ControllerFn = dyn Fn(JsonMap, JsonMap) -> BoxFuture<'static, ControllerOutput> + Send + Sync;
type AfterwareFn = dyn Fn(&JsonMap, &JsonMap, &BlestError) + Send + Sync;

/// One step of a route pipeline.
#[derive(Clone)]
pub enum Handler {
    /// Mutates the per-request context before the controller runs.
    Middleware(Arc<MiddlewareFn>),
    /// Produces the result for the batch item.
    Controller(Arc<ControllerFn>),
    /// Observes the error after a failed pipeline.
    Afterware(Arc<AfterwareFn>),
}

impl Handler {
    /// Wraps a synchronous context-mutating function as middleware.
    ///
    /// Middleware receives the request body and a mutable reference to the
    /// per-item context copy; later steps observe its mutations.
    pub fn middleware<F>(f: F) -> Self
    where
        F: Fn(&JsonMap, &mut JsonMap) + Send + Sync + 'static,
    {
        Self::Middleware(Arc::new(f))
    }

    /// Wraps an async function as a controller.
    ///
    /// The controller owns clones of the body and of the context as of the
    /// point it runs, so its future does not borrow from the pipeline.
    pub fn controller<F, Fut>(f: F) -> Self
    where
        F: Fn(JsonMap, JsonMap) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ControllerOutput> + Send + 'static,
    {
        Self::Controller(Arc::new(move |body, context| {
            Box::pin(f(body, context)) as BoxFuture<'static, ControllerOutput>
        }))
    }

    /// Wraps a synchronous observer as afterware.
    pub fn afterware<F>(f: F) -> Self
    where
        F: Fn(&JsonMap, &JsonMap, &BlestError) + Send + Sync + 'static,
    {
        Self::Afterware(Arc::new(f))
    }

    pub fn is_middleware(&self) -> bool {
        matches!(self, Self::Middleware(_))
    }

    pub fn is_controller(&self) -> bool {
        matches!(self, Self::Controller(_))
    }

    pub fn is_afterware(&self) -> bool {
        matches!(self, Self::Afterware(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Middleware(_) => "Middleware",
            Self::Controller(_) => "Controller",
            Self::Afterware(_) => "Afterware",
        };
        f.write_str(kind)
    }
}
