use crate::body::ResponseBody;
use crate::error::DispatchError;
use crate::exchange::Exchange;
use crate::responder::Responder;
use async_trait::async_trait;
use futures::future::BoxFuture;
use http::Response;
use std::fmt;
use std::marker::PhantomData;

/// What a handler or an interceptor produces: a response, or the error to render as a problem.
pub type HandlerResult = Result<Response<ResponseBody>, DispatchError>;

/// The uniform contract every route terminates in.
///
/// Typed handlers, closures and user types are all erased to `dyn RequestHandler` when they are
/// registered, so the router and the interceptor chain never see request or response types.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, exchange: &mut Exchange) -> HandlerResult;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, exchange: &mut Exchange) -> HandlerResult {
        (**self).invoke(exchange).await
    }
}

/// a closure holder which represents any handler working on the raw [`Exchange`]
pub struct FnHandler<F, R> {
    f: F,
    _phantom: PhantomData<fn() -> R>,
}

/// Creates a handler from a closure returning a boxed future of any [`Responder`].
///
/// # Example
/// ```
/// use futures::FutureExt;
/// use micro_dispatch::{handler_fn, Exchange};
///
/// let hello = handler_fn(|exchange: &mut Exchange| {
///     let name = exchange.path_params().get("name").unwrap_or("world").to_string();
///     async move { format!("hello {name}") }.boxed()
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F, R>(f: F) -> FnHandler<F, R>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, R> + Send + Sync,
    R: Responder,
{
    FnHandler { f, _phantom: PhantomData }
}

impl<F, R> fmt::Debug for FnHandler<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[async_trait]
impl<F, R> RequestHandler for FnHandler<F, R>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, R> + Send + Sync,
    R: Responder + Send,
{
    async fn invoke(&self, exchange: &mut Exchange) -> HandlerResult {
        let responder = (self.f)(exchange).await;
        responder.respond_to(exchange)
    }
}
