//! Request routing and dispatch for micro http servers.
//!
//! The host transport hands a [`Dispatcher`] one `http::Request` at a time. The dispatcher
//! resolves it against a [`Router`], runs the matched route's interceptor chain around its handler
//! and turns every failure into a single [`Problem`] response.
//!
//! - [`router`]: route table with prefix groups
//! - [`interceptor`]: the onion-style chain, plus `Recovery`, `AccessLog` and `Deadline`
//! - [`typed`]: decode, validate, invoke and encode around plain async functions
//! - [`negotiate`] and [`problem`]: content negotiation and RFC 9457 style error bodies

mod body;
mod dispatcher;
mod error;
mod exchange;
mod handler;
mod responder;

pub mod interceptor;
pub mod negotiate;
pub mod problem;
pub mod router;
pub mod typed;
pub mod validate;

pub use body::RequestBody;
pub use body::ResponseBody;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, DecodeError, DispatchError, HandlerError};
pub use exchange::{Exchange, PathParams};
pub use handler::{handler_fn, FnHandler, HandlerResult, RequestHandler};
pub use interceptor::{Interceptor, Next};
pub use problem::Problem;
pub use responder::Responder;
pub use router::Router;
pub use typed::{typed, TypedRequest};
