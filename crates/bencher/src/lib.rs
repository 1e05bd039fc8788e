use bytes::Bytes;
use http::Method;
use micro_dispatch::{handler_fn, PatternError, Router};

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    table: RouteTable,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, table: RouteTable) -> Self {
        Self { name, group, table }
    }

    pub fn small(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Small, table)
    }

    pub fn normal(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Normal, table)
    }

    pub fn large(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Large, table)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }
}

/// A synthetic route table: `size` resources, each with an index, a show and an update
/// route. The probe path hits the show route of the last resource, so matching scans
/// nearly the whole table.
#[derive(Debug, Copy, Clone)]
pub struct RouteTable {
    size: usize,
}

impl RouteTable {
    pub const fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn routes(&self) -> usize {
        self.size * 3
    }

    pub fn router(&self) -> Result<Router, PatternError> {
        async fn index() -> &'static str {
            "index"
        }

        async fn show(req: micro_dispatch::Request) -> String {
            req.param("id").unwrap_or_default().to_owned()
        }

        let mut router = Router::new();
        for i in 0..self.size {
            router.get(&format!("/resource{i}"), handler_fn(index))?.name(format!("resource{i}.index"));
            router.get(&format!("/resource{i}/{{id}}/{{tab?}}"), handler_fn(show))?.name(format!("resource{i}.show"));
            router.put(&format!("/resource{i}/{{id}}"), handler_fn(show))?;
        }
        Ok(router)
    }

    pub fn probe_path(&self) -> String {
        format!("/resource{}/42/comments", self.size.saturating_sub(1))
    }

    pub fn probe_request(&self) -> http::Request<Bytes> {
        let mut request = http::Request::new(Bytes::new());
        *request.method_mut() = Method::GET;
        *request.uri_mut() = self.probe_path().parse().unwrap_or_default();
        request
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
