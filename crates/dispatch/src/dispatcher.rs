use crate::body::{RequestBody, ResponseBody};
use crate::error::DispatchError;
use crate::exchange::Exchange;
use crate::interceptor::Next;
use crate::problem;
use crate::router::Router;
use arc_swap::ArcSwap;
use http::header::ALLOW;
use http::{HeaderValue, Request, Response};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Entry point for the host transport: one request in, one response out.
///
/// The dispatcher resolves the route, runs the route's interceptor chain around its handler and
/// renders any error leaving the chain as a single problem response. The route table can be
/// replaced at runtime; a dispatch already in flight keeps the table it started with.
#[derive(Debug)]
pub struct Dispatcher {
    router: ArcSwap<Router>,
}

impl Dispatcher {
    pub fn new(router: Router) -> Self {
        Self { router: ArcSwap::from_pointee(router) }
    }

    /// Atomically swaps in a fully built route table.
    pub fn replace_router(&self, router: Router) {
        info!(routes = router.len(), "replace route table");
        self.router.store(Arc::new(router));
    }

    /// A snapshot of the current route table.
    pub fn router(&self) -> Arc<Router> {
        self.router.load_full()
    }

    pub async fn dispatch<B: Into<RequestBody>>(&self, request: Request<B>) -> Response<ResponseBody> {
        self.handle(Exchange::new(request)).await
    }

    /// Serves an already built exchange, e.g. one carrying the host's cancellation token.
    pub async fn handle(&self, mut exchange: Exchange) -> Response<ResponseBody> {
        let router = self.router.load_full();

        let result = match router.at(exchange.method(), exchange.path()) {
            Ok(matched) => {
                let (entry, params) = matched.into_parts();
                exchange.set_path_params(params);
                Next::new(entry.interceptors(), entry.handler()).run(&mut exchange).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => response,
            Err(e) => render_error(&exchange, &e),
        }
    }
}

fn render_error(exchange: &Exchange, error: &DispatchError) -> Response<ResponseBody> {
    let status = error.status();
    if status.is_server_error() {
        error!(method = %exchange.method(), path = %exchange.path(), status = status.as_u16(), cause = %error, "request failed");
    } else {
        debug!(method = %exchange.method(), path = %exchange.path(), status = status.as_u16(), cause = %error, "request rejected");
    }

    let mut response = problem::render(&error.to_problem(exchange.path()), exchange.accept());

    if let DispatchError::MethodNotAllowed { allowed, .. } = error {
        let allow = allowed.iter().map(http::Method::as_str).collect::<Vec<_>>().join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(ALLOW, value);
        }
    }
    response
}
