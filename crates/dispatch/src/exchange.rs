//! Per-request state threaded through interceptors and handlers.
//!
//! - `Exchange`: request head, consumable body, matched path parameters, a typed state bag and
//!   the cancellation signal of one request
//! - `PathParams`: parameters bound by the matched route pattern

use crate::body::RequestBody;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Request, Uri, Version};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The mutable context of one request.
///
/// An `Exchange` is exclusively owned by the task serving the request and passed by `&mut`
/// through the interceptor chain, so nothing in it is shared with other requests.
pub struct Exchange {
    head: Parts,
    body: Option<RequestBody>,
    path_params: PathParams,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl Exchange {
    pub fn new<B: Into<RequestBody>>(request: Request<B>) -> Self {
        let (head, body) = request.into_parts();
        Self {
            head,
            body: Some(body.into()),
            path_params: PathParams::empty(),
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Uses the host's cancellation token instead of a private one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    /// The `Accept` header, if present and valid visible ASCII.
    pub fn accept(&self) -> Option<&str> {
        self.header_str(http::header::ACCEPT)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_str(http::header::CONTENT_TYPE)
    }

    fn header_str(&self, name: http::header::HeaderName) -> Option<&str> {
        self.head.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Typed state shared between the interceptors and the handler of this request.
    pub fn state(&self) -> &Extensions {
        &self.head.extensions
    }

    pub fn state_mut(&mut self) -> &mut Extensions {
        &mut self.head.extensions
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub(crate) fn set_path_params(&mut self, path_params: PathParams) {
        self.path_params = path_params;
    }

    /// Takes the body out of the exchange; later calls return `None`.
    pub fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }

    pub fn replace_body(&mut self, body: RequestBody) -> Option<RequestBody> {
        self.body.replace(body)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the deadline, keeping an earlier one if already present.
    pub fn tighten_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(self.deadline.map_or(deadline, |current| current.min(deadline)));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Completes once the request is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancellation.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancellation.cancelled().await,
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("path_params", &self.path_params)
            .field("body_taken", &self.body.is_none())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Path parameters bound by the matched route, e.g. `id` for `/users/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: Vec<(String, String)>,
}

impl PathParams {
    #[inline]
    pub fn empty() -> Self {
        Self { inner: vec![] }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { inner: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets the value of a path parameter by its name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.inner.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Parses a path parameter; `None` if absent, `Some(Err)` if it does not parse.
    pub fn parse<T: FromStr>(&self, name: impl AsRef<str>) -> Option<Result<T, T::Err>> {
        self.get(name).map(str::parse)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Exchange, PathParams};
    use http::{Method, Request};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn exchange() -> Exchange {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/pets/7?verbose=true")
            .header(http::header::ACCEPT, "application/json")
            .body("{}")
            .unwrap();
        Exchange::new(request)
    }

    #[test]
    fn request_head_accessors() {
        let exchange = exchange();
        assert_eq!(exchange.method(), Method::POST);
        assert_eq!(exchange.path(), "/pets/7");
        assert_eq!(exchange.uri().query(), Some("verbose=true"));
        assert_eq!(exchange.accept(), Some("application/json"));
        assert_eq!(exchange.content_type(), None);
    }

    #[test]
    fn body_is_taken_once() {
        let mut exchange = exchange();
        assert!(exchange.take_body().is_some());
        assert!(exchange.take_body().is_none());
    }

    #[test]
    fn state_bag_is_typed() {
        #[derive(Debug, Clone, PartialEq)]
        struct UserId(u64);

        let mut exchange = exchange();
        exchange.state_mut().insert(UserId(42));
        assert_eq!(exchange.state().get::<UserId>(), Some(&UserId(42)));
        assert!(exchange.state().get::<String>().is_none());
    }

    #[test]
    fn path_params_lookup() {
        let mut params = PathParams::with_capacity(2);
        params.push("owner", "zava");
        params.push("id", "42");

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.parse::<u32>("id"), Some(Ok(42)));
        assert!(params.parse::<u32>("owner").unwrap().is_err());
        assert!(params.get("missing").is_none());
    }

    #[tokio::test]
    async fn cancellation_token_is_observed() {
        let token = CancellationToken::new();
        let exchange = exchange().with_cancellation(token.clone());
        assert!(!exchange.is_cancelled());

        token.cancel();
        assert!(exchange.is_cancelled());
        exchange.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_observed() {
        let mut exchange = exchange().with_deadline(Instant::now() + Duration::from_secs(10));
        exchange.tighten_deadline(Instant::now() + Duration::from_secs(1));
        exchange.tighten_deadline(Instant::now() + Duration::from_secs(5));
        assert!(!exchange.is_cancelled());

        exchange.cancelled().await;
        assert!(exchange.is_cancelled());
    }
}
