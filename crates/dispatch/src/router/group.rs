use crate::interceptor::Interceptor;
use crate::router::RouteBuilder;
use std::fmt;
use std::sync::Arc;

/// A path prefix plus interceptors shared by every route declared inside it.
///
/// Nested groups concatenate their prefixes and run their interceptors after the ones of the
/// enclosing group. An interceptor applies to the whole group regardless of where it is declared.
pub struct Group {
    prefix: String,
    interceptors: Vec<Arc<dyn Interceptor>>,
    items: Vec<Item>,
}

enum Item {
    Route(String, RouteBuilder),
    Group(Group),
}

/// A route with its group prefixes and group interceptors applied.
pub(crate) struct FlatRoute {
    pub(crate) path: String,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) route: RouteBuilder,
}

impl Group {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: normalize_prefix(&prefix.into()), interceptors: vec![], items: vec![] }
    }

    pub fn route(mut self, path: impl Into<String>, route: RouteBuilder) -> Self {
        self.items.push(Item::Route(path.into(), route));
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.items.push(Item::Group(group));
        self
    }

    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Flattens this group into `out`, in declaration order.
    pub(crate) fn flatten_into(self, parent_prefix: &str, parent_interceptors: &[Arc<dyn Interceptor>], out: &mut Vec<FlatRoute>) {
        let prefix = format!("{parent_prefix}{}", self.prefix);
        let mut interceptors = parent_interceptors.to_vec();
        interceptors.extend(self.interceptors);

        for item in self.items {
            match item {
                Item::Route(path, mut route) => {
                    let mut chain = interceptors.clone();
                    chain.append(&mut route.interceptors);
                    out.push(FlatRoute { path: join(&prefix, &path), interceptors: chain, route });
                }
                Item::Group(group) => group.flatten_into(&prefix, &interceptors, out),
            }
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix)
            .field("interceptors", &self.interceptors.len())
            .field("items", &self.items.len())
            .finish()
    }
}

/// `"/"` and `""` both mean "no prefix"; a trailing slash is dropped.
fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}

fn join(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path) {
        (true, _) => path.to_string(),
        (false, "/") => prefix.to_string(),
        (false, path) => format!("{prefix}{path}"),
    }
}
