//! Typed handlers: decode, validate, invoke and encode around a plain async function.
//!
//! [`typed`] adapts `async fn(TypedRequest<R>) -> Result<S, HandlerError>` into a
//! [`RequestHandler`]. Each step short-circuits with the matching [`DispatchError`], so the user
//! function only ever sees a decoded and validated `R`.
//!
//! # Example
//! ```
//! use micro_dispatch::router::{post, Router};
//! use micro_dispatch::typed::{typed, TypedRequest};
//! use micro_dispatch::HandlerError;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct NewPet {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Pet {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn create(request: TypedRequest<NewPet>) -> Result<Pet, HandlerError> {
//!     Ok(Pet { id: 1, name: request.into_data().name })
//! }
//!
//! let router = Router::builder().route("/pets", post(typed(create))).build();
//! assert!(router.is_ok());
//! ```

mod codec;

pub use codec::{Decoder, Encoder, FormDecoder, JsonDecoder, JsonEncoder};

use crate::body::ResponseBody;
use crate::error::{DecodeError, DispatchError, HandlerError};
use crate::exchange::{Exchange, PathParams};
use crate::handler::{HandlerResult, RequestHandler};
use crate::negotiate::negotiate;
use crate::validate::Validator;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Uri};
use mime::Mime;
use serde::de::value::UnitDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bodies larger than this are rejected with `413` unless configured otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Status of a successful typed response when none is configured: `201` for `POST`, `204` for
/// `DELETE`, `200` otherwise.
pub fn default_status(method: &Method) -> StatusCode {
    match *method {
        Method::POST => StatusCode::CREATED,
        Method::DELETE => StatusCode::NO_CONTENT,
        _ => StatusCode::OK,
    }
}

/// The decoded request handed to a typed handler function.
#[derive(Debug)]
pub struct TypedRequest<R> {
    data: R,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: PathParams,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl<R> TypedRequest<R> {
    fn new(data: R, exchange: &Exchange) -> Self {
        Self {
            data,
            method: exchange.method().clone(),
            uri: exchange.uri().clone(),
            headers: exchange.headers().clone(),
            path_params: exchange.path_params().clone(),
            cancellation: exchange.cancellation().clone(),
            deadline: exchange.deadline(),
        }
    }

    pub fn data(&self) -> &R {
        &self.data
    }

    pub fn into_data(self) -> R {
        self.data
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Parses the path parameter `name`.
    ///
    /// A value that does not parse is the client's fault (400); a name the route does not
    /// declare is a programming error (500).
    pub fn path_param<T: FromStr>(&self, name: &str) -> Result<T, HandlerError> {
        match self.path_params.parse(name) {
            Some(Ok(value)) => Ok(value),
            Some(Err(_)) => Err(HandlerError::bad_request(format!("path parameter '{name}' is invalid"))),
            None => Err(HandlerError::internal(format!("route declares no path parameter '{name}'"))),
        }
    }

    /// Deserializes the query string, an absent one reads as empty.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let query = self.uri.query().unwrap_or_default();
        serde_qs::from_str(query).map_err(|e| {
            debug!(cause = %e, "failed to parse query string");
            HandlerError::bad_request("query string is invalid")
        })
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// A typed handler: a user function plus the codecs, validator and response status around it.
pub struct TypedHandler<F, R, S> {
    f: F,
    from_empty: fn() -> Option<R>,
    decoders: Vec<Box<dyn Decoder<R>>>,
    encoders: Vec<Box<dyn Encoder<S>>>,
    offered: Vec<Mime>,
    validator: Option<Box<dyn Validator<R>>>,
    status: Option<StatusCode>,
    body_limit: usize,
}

/// Wraps `f` with the JSON and form decoders and the JSON encoder.
pub fn typed<F, Fut, R, S>(f: F) -> TypedHandler<F, R, S>
where
    F: Fn(TypedRequest<R>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S, HandlerError>> + Send,
    R: DeserializeOwned + Send + 'static,
    S: Serialize + Send + 'static,
{
    let encoder = JsonEncoder::default();
    TypedHandler {
        f,
        from_empty: from_empty::<R>,
        decoders: vec![Box::new(JsonDecoder) as Box<dyn Decoder<R>>, Box::new(FormDecoder)],
        offered: vec![Encoder::<S>::media_type(&encoder).clone()],
        encoders: vec![Box::new(encoder)],
        validator: None,
        status: None,
        body_limit: DEFAULT_BODY_LIMIT,
    }
}

/// `R` read from "no value": succeeds for `()` and `Option<_>`.
fn from_empty<R: DeserializeOwned>() -> Option<R> {
    let nothing: UnitDeserializer<serde::de::value::Error> = ().into_deserializer();
    R::deserialize(nothing).ok()
}

impl<F, R, S> TypedHandler<F, R, S> {
    /// Adds a decoder, tried after the ones already configured.
    pub fn decoder<D: Decoder<R> + 'static>(mut self, decoder: D) -> Self {
        self.decoders.push(Box::new(decoder));
        self
    }

    /// Adds an encoder; earlier encoders win negotiation ties.
    pub fn encoder<E: Encoder<S> + 'static>(mut self, encoder: E) -> Self {
        self.offered.push(encoder.media_type().clone());
        self.encoders.push(Box::new(encoder));
        self
    }

    pub fn validator<V: Validator<R> + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Overrides the method-derived success status.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    async fn read_body(&self, exchange: &mut Exchange) -> Result<Bytes, DispatchError> {
        let Some(body) = exchange.take_body() else {
            return Ok(Bytes::new());
        };

        tokio::select! {
            biased;
            () = exchange.cancelled() => Err(DispatchError::Cancelled),
            collected = body.collect_limited(self.body_limit) => collected.map_err(DispatchError::from),
        }
    }

    fn decode(&self, exchange: &Exchange, body: &Bytes) -> Result<R, DecodeError> {
        if body.is_empty() {
            return (self.from_empty)().ok_or(DecodeError::MissingBody);
        }

        let content_type = exchange.content_type().ok_or(DecodeError::MissingContentType)?;
        let decoder = content_type
            .parse::<Mime>()
            .ok()
            .and_then(|mime| self.decoders.iter().find(|decoder| decoder.accepts(&mime)))
            .ok_or_else(|| DecodeError::unsupported_content_type(content_type))?;

        decoder.decode(body).map_err(|e| {
            debug!(cause = %e, content_type, "failed to decode request body");
            DecodeError::malformed(e)
        })
    }

    fn respond(&self, exchange: &Exchange, value: &S) -> HandlerResult {
        let status = self.status.unwrap_or_else(|| default_status(exchange.method()));
        if status == StatusCode::NO_CONTENT {
            let mut response = Response::new(ResponseBody::empty());
            *response.status_mut() = status;
            return Ok(response);
        }

        let media_type = negotiate(exchange.accept(), &self.offered)?;
        let encoder = self
            .encoders
            .iter()
            .find(|encoder| encoder.media_type() == media_type)
            .ok_or_else(|| HandlerError::internal(format!("no encoder for {media_type}")))?;

        let body = encoder.encode(value).map_err(HandlerError::internal)?;
        let content_type = HeaderValue::from_str(media_type.as_ref()).map_err(HandlerError::internal)?;

        let mut response = Response::new(ResponseBody::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        Ok(response)
    }
}

impl<F, R, S> fmt::Debug for TypedHandler<F, R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandler")
            .field("decoders", &self.decoders.len())
            .field("offered", &self.offered)
            .field("validator", &self.validator.is_some())
            .field("status", &self.status)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut, R, S> RequestHandler for TypedHandler<F, R, S>
where
    F: Fn(TypedRequest<R>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S, HandlerError>> + Send,
    R: Send + 'static,
    S: Send + 'static,
{
    async fn invoke(&self, exchange: &mut Exchange) -> HandlerResult {
        let body = self.read_body(exchange).await?;
        let data = self.decode(exchange, &body)?;

        if let Some(validator) = &self.validator {
            validator.validate(&data)?;
        }

        if exchange.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        let value = (self.f)(TypedRequest::new(data, exchange)).await?;
        self.respond(exchange, &value)
    }
}
