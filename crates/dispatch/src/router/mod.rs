//! The route table.
//!
//! Routes are declared on a [`RouterBuilder`], optionally inside nested [`Group`]s, and compiled by
//! [`RouterBuilder::build`] into an immutable [`Router`]. Every method owns its own radix trees, so
//! a lookup costs time proportional to the number of path segments and a miss can tell a `404` from
//! a `405`.
//!
//! At every depth a literal segment beats a named parameter, which beats a wildcard. Only patterns
//! of the same shape conflict: `/files/:name` and `/files/*path` coexist, and `/files/a` goes to the
//! first while `/files/a/b` goes to the second.

mod group;
mod pattern;

pub use group::Group;
pub use pattern::{RoutePattern, Segment, DEFAULT_WILDCARD};

use crate::error::DispatchError;
use crate::exchange::PathParams;
use crate::handler::RequestHandler;
use crate::interceptor::Interceptor;
use group::FlatRoute;
use http::Method;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("parameter '{name}' is declared more than once in '{pattern}'")]
    DuplicateParam { pattern: String, name: String },

    #[error("route {method} '{pattern}' conflicts with an already registered route")]
    Conflict { method: Method, pattern: String },
}

/// Main router structure that maps (method, path) to a route entry
pub struct Router {
    trees: Vec<MethodTree>,
    entries: Vec<RouteEntry>,
}

// matchit rejects a parameter and a catch-all at the same position, so such routes are spread over
// several layers and a lookup keeps the candidate with the best precedence.
struct MethodTree {
    method: Method,
    layers: Vec<matchit::Router<usize>>,
}

impl MethodTree {
    fn new(method: Method) -> Self {
        Self { method, layers: vec![] }
    }

    fn insert(&mut self, path: &str, index: usize) -> Result<(), matchit::InsertError> {
        for layer in &mut self.layers {
            // a failed insert may already have split nodes, so try on a copy
            let mut candidate = layer.clone();
            match candidate.insert(path, index) {
                Ok(()) => {
                    *layer = candidate;
                    return Ok(());
                }
                Err(matchit::InsertError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let mut layer = matchit::Router::new();
        layer.insert(path, index)?;
        self.layers.push(layer);
        Ok(())
    }

    fn matches(&self, path: &str) -> bool {
        self.layers.iter().any(|layer| layer.at(path).is_ok())
    }
}

/// One registered route: its handler and the fully composed interceptor chain.
pub struct RouteEntry {
    method: Method,
    pattern: RoutePattern,
    // positional names the parameters were inserted under in the tree
    slots: Vec<String>,
    precedence: Vec<u8>,
    param_names: Vec<String>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    handler: Box<dyn RequestHandler>,
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'router> {
    entry: &'router RouteEntry,
    params: PathParams,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Resolves `method` and `path` to a route.
    ///
    /// Fails with [`DispatchError::RouteNotFound`] when no route matches the path under any method,
    /// or [`DispatchError::MethodNotAllowed`] listing the methods that do match it.
    pub fn at<'router>(&'router self, method: &Method, path: &str) -> Result<RouteMatch<'router>, DispatchError> {
        let best = self.tree(method).and_then(|tree| {
            tree.layers
                .iter()
                .filter_map(|layer| layer.at(path).ok())
                .min_by(|a, b| self.entries[*a.value].precedence.cmp(&self.entries[*b.value].precedence))
        });

        if let Some(matched) = best {
            let entry = &self.entries[*matched.value];
            let mut params = PathParams::with_capacity(entry.slots.len());
            for (slot, name) in entry.slots.iter().zip(&entry.param_names) {
                if let Some(value) = matched.params.get(slot) {
                    params.push(name.as_str(), value);
                }
            }
            return Ok(RouteMatch { entry, params });
        }

        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            debug!(%method, path, "no route matches");
            Err(DispatchError::RouteNotFound { path: path.to_string() })
        } else {
            debug!(%method, path, ?allowed, "method not allowed");
            Err(DispatchError::MethodNotAllowed { method: method.clone(), allowed })
        }
    }

    /// Methods having a route that matches `path`, in a stable order.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.trees.iter().filter(|t| t.matches(path)).map(|t| t.method.clone()).collect()
    }

    /// Registered routes as (method, pattern), in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.entries.iter().map(|entry| (&entry.method, entry.pattern.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tree(&self, method: &Method) -> Option<&MethodTree> {
        self.trees.iter().find(|t| t.method == *method)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes().collect::<Vec<_>>()).finish()
    }
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Root, group and route interceptors, outermost first.
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl<'router> RouteMatch<'router> {
    pub fn entry(&self) -> &'router RouteEntry {
        self.entry
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_parts(self) -> (&'router RouteEntry, PathParams) {
        (self.entry, self.params)
    }
}

/// Collects routes, groups and root interceptors; the builder itself acts as the root group.
#[derive(Debug)]
pub struct RouterBuilder {
    root: Group,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { root: Group::new("") }
    }

    pub fn route(mut self, path: impl Into<String>, route: RouteBuilder) -> Self {
        self.root = self.root.route(path, route);
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.root = self.root.group(group);
        self
    }

    /// Adds an interceptor running around every route of the router.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.root = self.root.interceptor(interceptor);
        self
    }

    /// Compiles the declared routes, failing on the first invalid or conflicting one.
    pub fn build(self) -> Result<Router, RouteError> {
        let mut flat = vec![];
        self.root.flatten_into("", &[], &mut flat);

        let mut trees: Vec<MethodTree> = vec![];
        let mut entries = Vec::with_capacity(flat.len());
        let mut shapes = HashSet::new();

        for FlatRoute { path, interceptors, route } in flat {
            let pattern = RoutePattern::parse(&path)?;
            let tree_path = pattern.to_matchit();
            let conflict = || RouteError::Conflict { method: route.method.clone(), pattern: path.clone() };

            if !shapes.insert((route.method.clone(), tree_path.clone())) {
                return Err(conflict());
            }

            let index = entries.len();
            let tree = match trees.iter().position(|t| t.method == route.method) {
                Some(position) => &mut trees[position],
                None => {
                    trees.push(MethodTree::new(route.method.clone()));
                    trees.sort_by_key(|t| method_rank(&t.method));
                    let position = trees.iter().position(|t| t.method == route.method).unwrap_or_default();
                    &mut trees[position]
                }
            };
            tree.insert(&tree_path, index).map_err(|e| match e {
                matchit::InsertError::Conflict { .. } => conflict(),
                e => RouteError::InvalidPattern { pattern: path.clone(), reason: e.to_string() },
            })?;

            debug!(method = %route.method, pattern = %path, interceptors = interceptors.len(), "register route");

            let param_names = pattern.param_names().map(ToString::to_string).collect::<Vec<_>>();
            let slots = (0..param_names.len()).map(|i| format!("p{i}")).collect();
            let precedence = pattern.precedence();
            entries.push(RouteEntry {
                method: route.method,
                pattern,
                slots,
                precedence,
                param_names,
                interceptors,
                handler: route.handler,
            });
        }

        Ok(Router { trees, entries })
    }
}

/// Standard methods in the conventional `Allow` order, extension methods after them.
fn method_rank(method: &Method) -> (usize, String) {
    const ORDER: [Method; 9] = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
        Method::CONNECT,
        Method::TRACE,
    ];
    match ORDER.iter().position(|m| m == method) {
        Some(rank) => (rank, String::new()),
        None => (ORDER.len(), method.as_str().to_string()),
    }
}

/// A handler for one method, plus the interceptors local to this route.
pub struct RouteBuilder {
    method: Method,
    handler: Box<dyn RequestHandler>,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
}

impl RouteBuilder {
    pub fn new<H: RequestHandler + 'static>(method: Method, handler: H) -> Self {
        Self { method, handler: Box::new(handler), interceptors: vec![] }
    }

    /// Adds an interceptor running only around this route, inside the group ones.
    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("method", &self.method)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Routes `", stringify!($method), "` requests to `handler`.")]
        pub fn $name<H: RequestHandler + 'static>(handler: H) -> RouteBuilder {
            RouteBuilder::new(Method::$method, handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

#[cfg(test)]
mod tests {
    use super::{delete, get, post, put, Group, RouteError, Router};
    use crate::error::DispatchError;
    use crate::exchange::Exchange;
    use crate::handler::{handler_fn, RequestHandler};
    use crate::interceptor::AccessLog;
    use futures::FutureExt;
    use http::Method;

    fn named(name: &'static str) -> impl RequestHandler {
        handler_fn(move |_exchange: &mut Exchange| async move { name }.boxed())
    }

    fn router() -> Router {
        Router::builder()
            .route("/users/:id", get(named("show")))
            .route("/users/new", get(named("new")))
            .route("/users/:id", delete(named("destroy")))
            .route("/users", post(named("create")))
            .route("/files/*path", get(named("files")))
            .route("/", get(named("index")))
            .build()
            .unwrap()
    }

    #[test]
    fn literal_beats_parameter() {
        let router = router();

        let matched = router.at(&Method::GET, "/users/new").unwrap();
        assert_eq!(matched.entry().pattern().as_str(), "/users/new");
        assert!(matched.params().is_empty());

        let matched = router.at(&Method::GET, "/users/42").unwrap();
        assert_eq!(matched.entry().pattern().as_str(), "/users/:id");
        assert_eq!(matched.params().get("id"), Some("42"));
    }

    #[test]
    fn wildcard_takes_the_remainder() {
        let router = router();
        let matched = router.at(&Method::GET, "/files/docs/2024/report.pdf").unwrap();
        assert_eq!(matched.params().get("path"), Some("docs/2024/report.pdf"));

        assert!(matches!(router.at(&Method::GET, "/files/"), Err(DispatchError::RouteNotFound { .. })));
    }

    #[test]
    fn parameter_and_wildcard_at_the_same_depth() {
        let router = Router::builder()
            .route("/files/*path", get(named("tree")))
            .route("/files/:name", get(named("file")))
            .route("/files/:dir/*rest", get(named("dir")))
            .route("/files/readme", get(named("readme")))
            .build()
            .unwrap();

        let pattern_of = |path| router.at(&Method::GET, path).unwrap().entry().pattern().as_str().to_string();
        assert_eq!(pattern_of("/files/readme"), "/files/readme");
        assert_eq!(pattern_of("/files/a"), "/files/:name");
        assert_eq!(pattern_of("/files/a/b"), "/files/:dir/*rest");
        assert_eq!(pattern_of("/files/a/b/c"), "/files/:dir/*rest");

        let matched = router.at(&Method::GET, "/files/a").unwrap();
        assert_eq!(matched.params().get("name"), Some("a"));

        let matched = router.at(&Method::GET, "/files/a/b/c").unwrap();
        assert_eq!(matched.params().get("dir"), Some("a"));
        assert_eq!(matched.params().get("rest"), Some("b/c"));
    }

    #[test]
    fn wildcard_used_when_parameter_cannot_match() {
        let router = Router::builder()
            .route("/files/:name", get(named("file")))
            .route("/files/*path", get(named("tree")))
            .build()
            .unwrap();

        let matched = router.at(&Method::GET, "/files/a").unwrap();
        assert_eq!(matched.entry().pattern().as_str(), "/files/:name");

        let matched = router.at(&Method::GET, "/files/a/b").unwrap();
        assert_eq!(matched.entry().pattern().as_str(), "/files/*path");
        assert_eq!(matched.params().get("path"), Some("a/b"));
    }

    #[test]
    fn root_and_catch_all() {
        let router = Router::builder()
            .route("/*rest", get(named("fallback")))
            .route("/", get(named("index")))
            .build()
            .unwrap();

        assert_eq!(router.at(&Method::GET, "/").unwrap().entry().pattern().as_str(), "/");

        let matched = router.at(&Method::GET, "/docs/intro").unwrap();
        assert_eq!(matched.entry().pattern().as_str(), "/*rest");
        assert_eq!(matched.params().get("rest"), Some("docs/intro"));
    }

    #[test]
    fn allowed_methods_see_every_layer() {
        let router = Router::builder()
            .route("/files/:name", get(named("file")))
            .route("/files/*path", get(named("tree")))
            .route("/files/*path", put(named("upload")))
            .build()
            .unwrap();

        assert_eq!(router.allowed_methods("/files/a/b"), [Method::GET, Method::PUT]);

        let error = router.at(&Method::DELETE, "/files/a/b").unwrap_err();
        assert!(matches!(error, DispatchError::MethodNotAllowed { allowed, .. } if allowed == [Method::GET, Method::PUT]));
    }

    #[test]
    fn same_shape_wildcards_conflict() {
        let error = Router::builder()
            .route("/files/:name", get(named("file")))
            .route("/files/*path", get(named("a")))
            .route("/files/*rest", get(named("b")))
            .build()
            .unwrap_err();

        assert_eq!(error, RouteError::Conflict { method: Method::GET, pattern: "/files/*rest".into() });
    }

    #[test]
    fn root_route() {
        let router = router();
        assert_eq!(router.at(&Method::GET, "/").unwrap().entry().pattern().as_str(), "/");
    }

    #[test]
    fn unknown_path_is_not_found() {
        let router = router();
        let error = router.at(&Method::GET, "/nowhere").unwrap_err();
        assert!(matches!(error, DispatchError::RouteNotFound { path } if path == "/nowhere"));
    }

    #[test]
    fn other_method_is_not_allowed() {
        let router = router();
        let error = router.at(&Method::PUT, "/users/7").unwrap_err();
        match error {
            DispatchError::MethodNotAllowed { method, allowed } => {
                assert_eq!(method, Method::PUT);
                assert_eq!(allowed, [Method::GET, Method::DELETE]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn different_names_per_method() {
        let router = Router::builder()
            .route("/pets/:id", get(named("show")))
            .route("/pets/:pet_id", put(named("update")))
            .build()
            .unwrap();

        assert_eq!(router.at(&Method::GET, "/pets/1").unwrap().params().get("id"), Some("1"));
        assert_eq!(router.at(&Method::PUT, "/pets/1").unwrap().params().get("pet_id"), Some("1"));
    }

    #[test]
    fn duplicate_route_fails_to_build() {
        let error = Router::builder()
            .route("/users/:id", get(named("a")))
            .route("/users/:user_id", get(named("b")))
            .build()
            .unwrap_err();

        assert_eq!(error, RouteError::Conflict { method: Method::GET, pattern: "/users/:user_id".into() });
    }

    #[test]
    fn invalid_pattern_fails_to_build() {
        let error = Router::builder().route("/a/*rest/b", get(named("a"))).build().unwrap_err();
        assert!(matches!(error, RouteError::InvalidPattern { .. }));

        let error = Router::builder().route("/:id/:id", get(named("a"))).build().unwrap_err();
        assert!(matches!(error, RouteError::DuplicateParam { .. }));
    }

    #[test]
    fn groups_compose_prefix_and_interceptors() {
        let router = Router::builder()
            .interceptor(AccessLog)
            .group(
                Group::new("/api")
                    .interceptor(AccessLog)
                    .route("/", get(named("api")))
                    .group(Group::new("/v1").route("/pets/:id", get(named("pet")).with(AccessLog))),
            )
            .route("/health", get(named("health")))
            .build()
            .unwrap();

        let routes = router.routes().map(|(method, pattern)| (method.clone(), pattern)).collect::<Vec<_>>();
        assert_eq!(
            routes,
            [(Method::GET, "/api"), (Method::GET, "/api/v1/pets/:id"), (Method::GET, "/health")]
        );

        let depth = |path| router.at(&Method::GET, path).unwrap().entry().interceptors().len();
        assert_eq!(depth("/api"), 2);
        assert_eq!(depth("/api/v1/pets/9"), 3);
        assert_eq!(depth("/health"), 1);
    }
}
