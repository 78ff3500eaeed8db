//!
//! src/testing.rs
//!
//! Test doubles shared by the unit tests.
//!

use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::errors::ResolverError;
use crate::fetch::{HttpResponse, Transport};

type Matcher = Box<dyn Fn(&Url) -> bool + Send + Sync>;

/// Serves canned responses by first matching route and records every URL.
/// Unrouted URLs answer 404.
pub struct FakeTransport {
    routes: Vec<(Matcher, Result<HttpResponse, String>)>,
    calls: Mutex<Vec<Url>>
}

impl FakeTransport {
    pub fn new() -> Self {
        Self { routes: Vec::new(), calls: Mutex::new(Vec::new()) }
    }

    pub fn route(
        mut self,
        matcher: impl Fn(&Url) -> bool + Send + Sync + 'static,
        status: u16,
        body: &str
    ) -> Self {
        let resp = HttpResponse { status, body: body.to_string() };
        self.routes.push((Box::new(matcher), Ok(resp)));
        self
    }

    pub fn unreachable(
        mut self,
        matcher: impl Fn(&Url) -> bool + Send + Sync + 'static
    ) -> Self {
        self.routes.push((Box::new(matcher), Err("connection refused".to_string())));
        self
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose decoded URL contains `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|u| decoded(u).contains(needle)).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ResolverError> {
        self.calls.lock().unwrap().push(url.clone());
        for (matcher, resp) in &self.routes {
            if matcher(url) {
                return resp.clone().map_err(ResolverError::Http);
            }
        }
        Ok(HttpResponse { status: 404, body: "{}".to_string() })
    }
}

/// Path plus decoded query values, for readable matching
pub fn decoded(url: &Url) -> String {
    let mut out = url.path().to_string();
    for (k, v) in url.query_pairs() {
        out.push(' ');
        out.push_str(&k);
        out.push('=');
        out.push_str(&v);
    }
    out
}

/// Decoded `query` parameter of a MusicBrainz search URL
pub fn mb_query(url: &Url) -> String {
    url.query_pairs()
        .find(|(k, _)| k == "query")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
