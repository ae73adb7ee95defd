//! Shared fixtures for the dispatch benchmarks.

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: TestRequest,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, request: TestRequest) -> Self {
        Self { name, group, request }
    }

    pub fn small(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Small, request)
    }

    pub fn large(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Large, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &TestRequest {
        &self.request
    }
}

/// The parts of a request a benchmark feeds to the router or the negotiator.
#[derive(Debug, Copy, Clone)]
pub struct TestRequest {
    method: &'static str,
    path: &'static str,
    accept: Option<&'static str>,
}

impl TestRequest {
    pub const fn new(method: &'static str, path: &'static str) -> Self {
        Self { method, path, accept: None }
    }

    pub const fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn accept(&self) -> Option<&'static str> {
        self.accept
    }
}

/// Size of the route table a case runs against.
#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

impl TestGroup {
    /// Number of resources registered for this group; each resource gets a collection, an item
    /// and a nested item route.
    pub fn resources(self) -> usize {
        match self {
            TestGroup::Small => 4,
            TestGroup::Large => 200,
        }
    }
}
