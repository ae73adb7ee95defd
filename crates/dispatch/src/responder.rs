//! Conversion of raw handler return values into responses.
//!
//! The [`Responder`] trait lets [`handler_fn`](crate::handler_fn) closures return plain values
//! (`String`, `()`, `(StatusCode, T)`, a prebuilt `Response`, a [`Problem`]) or a `Result` whose
//! error side is rendered as a problem by the dispatcher.

use crate::body::ResponseBody;
use crate::error::DispatchError;
use crate::exchange::Exchange;
use crate::handler::HandlerResult;
use crate::problem::{render, Problem};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use std::convert::Infallible;

pub trait Responder {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult;
}

/// Ok is responded as usual, Err is handed to the dispatcher to become a problem.
impl<T: Responder, E: Into<DispatchError>> Responder for Result<T, E> {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult {
        match self {
            Ok(t) => t.respond_to(exchange),
            Err(e) => Err(e.into()),
        }
    }
}

/// None case returns an empty response.
impl<T: Responder> Responder for Option<T> {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult {
        match self {
            Some(t) => t.respond_to(exchange),
            None => Ok(Response::new(ResponseBody::empty())),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn respond_to(self, _exchange: &Exchange) -> HandlerResult {
        Ok(self.map(Into::into))
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult {
        let (status, responder) = self;
        let mut response = responder.respond_to(exchange)?;
        *response.status_mut() = status;
        Ok(response)
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult {
        let (responder, status) = self;
        (status, responder).respond_to(exchange)
    }
}

impl<T: Responder> Responder for Box<T> {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult {
        (*self).respond_to(exchange)
    }
}

impl Responder for () {
    fn respond_to(self, _exchange: &Exchange) -> HandlerResult {
        Ok(Response::new(ResponseBody::empty()))
    }
}

impl Responder for &'static str {
    fn respond_to(self, _exchange: &Exchange) -> HandlerResult {
        Ok(plain_text(ResponseBody::from(self)))
    }
}

impl Responder for String {
    fn respond_to(self, _exchange: &Exchange) -> HandlerResult {
        Ok(plain_text(ResponseBody::from(self)))
    }
}

/// A problem returned on purpose is rendered right away, negotiated against the request.
impl Responder for Problem {
    fn respond_to(self, exchange: &Exchange) -> HandlerResult {
        Ok(render(&self, exchange.accept()))
    }
}

impl Responder for Infallible {
    fn respond_to(self, _exchange: &Exchange) -> HandlerResult {
        match self {}
    }
}

fn plain_text(body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
