//! Interceptors wrapped around route handlers.
//!
//! Interceptors compose in the onion model: the first registered one runs outermost. Each receives
//! the [`Exchange`] and a [`Next`] continuation it may run once, or drop to short-circuit the rest of
//! the chain.

mod access_log;
mod deadline;
mod recovery;

pub use access_log::AccessLog;
pub use deadline::Deadline;
pub use recovery::Recovery;

use crate::exchange::Exchange;
use crate::handler::{HandlerResult, RequestHandler};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, exchange: &mut Exchange, next: Next<'_>) -> HandlerResult;
}

#[async_trait]
impl<I: Interceptor + ?Sized> Interceptor for Arc<I> {
    async fn intercept(&self, exchange: &mut Exchange, next: Next<'_>) -> HandlerResult {
        (**self).intercept(exchange, next).await
    }
}

/// The rest of the chain: the remaining interceptors followed by the route handler.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    handler: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Interceptor>], handler: &'a dyn RequestHandler) -> Self {
        Self { chain, handler }
    }

    /// Runs the remaining chain; consumes the continuation so it can only run once.
    pub async fn run(self, exchange: &mut Exchange) -> HandlerResult {
        match self.chain.split_first() {
            Some((interceptor, rest)) => interceptor.intercept(exchange, Next::new(rest, self.handler)).await,
            None => self.handler.invoke(exchange).await,
        }
    }

    /// Number of interceptors still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("remaining", &self.chain.len()).finish_non_exhaustive()
    }
}

/// an interceptor backed by a closure
pub struct FnInterceptor<F> {
    f: F,
}

/// Creates an interceptor from a closure.
///
/// # Example
/// ```
/// use futures::FutureExt;
/// use micro_dispatch::interceptor::interceptor_fn;
///
/// let tagged = interceptor_fn(|exchange, next| {
///     async move {
///         let mut response = next.run(exchange).await?;
///         response.headers_mut().insert("x-served-by", http::HeaderValue::from_static("micro-dispatch"));
///         Ok::<_, micro_dispatch::DispatchError>(response)
///     }
///     .boxed()
/// });
/// # let _ = tagged;
/// ```
pub fn interceptor_fn<F>(f: F) -> FnInterceptor<F>
where
    F: for<'a> Fn(&'a mut Exchange, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
    FnInterceptor { f }
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnInterceptor")
    }
}

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(&'a mut Exchange, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
    async fn intercept(&self, exchange: &mut Exchange, next: Next<'_>) -> HandlerResult {
        (self.f)(exchange, next).await
    }
}
