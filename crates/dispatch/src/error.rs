//! The failure taxonomy of a dispatch.
//!
//! Everything that can go wrong between route resolution and response encoding is a
//! [`DispatchError`]. Each variant converts into exactly one [`Problem`], which is what the
//! client finally sees.

use crate::negotiate::NotAcceptable;
use crate::problem::Problem;
use crate::validate::Violations;
use http::{Method, StatusCode};
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches path '{path}'")]
    RouteNotFound { path: String },

    #[error("method {method} is not allowed, allowed: {allowed:?}")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("validation error: {0}")]
    Validation(Violations),

    #[error(transparent)]
    NotAcceptable(#[from] NotAcceptable),

    #[error("handler error: {0}")]
    Handler(HandlerError),

    #[error("handler panicked: {message}")]
    PanicRecovered { message: String },

    #[error("request was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("request body is required")]
    MissingBody,

    #[error("request has a body but no content type")]
    MissingContentType,

    #[error("unsupported content type '{content_type}'")]
    UnsupportedContentType { content_type: String },

    #[error("request body is malformed")]
    Malformed { reason: String },

    #[error("request body exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("request body could not be read")]
    Read { reason: String },
}

impl DecodeError {
    pub fn malformed<S: ToString>(reason: S) -> Self {
        Self::Malformed { reason: reason.to_string() }
    }

    pub fn unsupported_content_type<S: ToString>(content_type: S) -> Self {
        Self::UnsupportedContentType { content_type: content_type.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DecodeError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// An error returned by user logic, carrying the status it should be reported with.
///
/// Any `std::error::Error` converts into a `HandlerError` with status 500, so `?` works inside
/// handlers. Use [`HandlerError::new`] to declare a different status.
pub struct HandlerError {
    status: StatusCode,
    detail: Option<String>,
    source: Option<BoxError>,
}

impl HandlerError {
    pub fn new<S: ToString>(status: StatusCode, detail: S) -> Self {
        Self { status, detail: Some(detail.to_string()), source: None }
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self { status, detail: None, source: None }
    }

    pub fn internal<E: Into<BoxError>>(source: E) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: None, source: Some(source.into()) }
    }

    pub fn not_found<S: ToString>(detail: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn conflict<S: ToString>(detail: S) -> Self {
        Self::new(StatusCode::CONFLICT, detail)
    }

    pub fn bad_request<S: ToString>(detail: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self::internal(e)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("status", &self.status)
            .field("detail", &self.detail)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ", caused by: {source}")?;
        }
        Ok(())
    }
}

impl From<HandlerError> for DispatchError {
    fn from(e: HandlerError) -> Self {
        DispatchError::Handler(e)
    }
}

impl From<Violations> for DispatchError {
    fn from(violations: Violations) -> Self {
        DispatchError::Validation(violations)
    }
}

const INTERNAL_DETAIL: &str = "the server encountered an unexpected condition";

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Decode(e) => e.status(),
            DispatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            DispatchError::Handler(e) => e.status(),
            DispatchError::PanicRecovered { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Builds the problem reported to the client for this error; `instance` is the request path.
    pub fn to_problem(&self, instance: &str) -> Problem {
        let problem = Problem::new(self.status()).with_instance(instance);
        match self {
            DispatchError::RouteNotFound { .. } => problem.with_detail("no route matches the request path"),
            DispatchError::MethodNotAllowed { method, .. } => {
                problem.with_detail(format!("method {method} is not allowed for this resource"))
            }
            DispatchError::Decode(e) => problem.with_detail(e.to_string()),
            DispatchError::Validation(violations) => {
                problem.with_detail("request failed validation").with_errors(violations)
            }
            DispatchError::NotAcceptable(e) => problem.with_detail(e.to_string()),
            DispatchError::Handler(e) => match e.detail() {
                Some(detail) => problem.with_detail(detail),
                None if e.status().is_server_error() => problem.with_detail(INTERNAL_DETAIL),
                None => problem.with_detail(e.status().canonical_reason().unwrap_or("request failed")),
            },
            DispatchError::PanicRecovered { .. } => problem.with_detail(INTERNAL_DETAIL),
            DispatchError::Cancelled => problem.with_detail("request was cancelled before completion"),
        }
    }
}
