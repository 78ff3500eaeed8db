//!
//! src/fetch.rs
//!
//! HTTP plumbing: the reqwest-backed transport, a politeness gate for
//! MusicBrainz, the read-through cached fetcher and the URL builders for
//! both services.
//!

use std::{sync::Arc, time::{Duration, Instant}};

use async_trait::async_trait;
use reqwest::{Client, header, redirect};
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::cache::ResponseCache;
use crate::config::{HttpConfig, IdentityConfig};
use crate::errors::ResolverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can GET a URL. Errors are transport-level only; a
/// non-2xx status is still an `Ok(HttpResponse)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ResolverError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn identified_client(http: &HttpConfig, id: &IdentityConfig) ->
    Result<Client, ResolverError> {

    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    h.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&id.user_agent)
            .map_err(|e| ResolverError::Config(
                format!("invalid user-agent {e}")
            ))?
    );
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| ResolverError::Http(format!("build client: {e}")))
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: Client
}

impl ReqwestTransport {
    pub fn new(http_config: &HttpConfig, identity: &IdentityConfig) ->
        Result<Self, ResolverError> {
        let http = identified_client(http_config, identity)?;
        Ok( Self { http } )
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ResolverError> {
        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok( HttpResponse { status, body } )
    }
}

/// Enforces a minimum spacing between requests, shared by all callers
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    state: tokio::sync::Mutex<Option<Instant>>
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, state: tokio::sync::Mutex::new(None) }
    }

    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.state.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Gates only requests whose host matches; everything else passes through
pub struct RateGatedTransport {
    inner: Arc<dyn Transport>,
    host: String,
    gate: RateGate
}

impl RateGatedTransport {
    pub fn new(inner: Arc<dyn Transport>, host: &str, min_interval: Duration) -> Self {
        Self { inner, host: host.to_ascii_lowercase(), gate: RateGate::new(min_interval) }
    }
}

#[async_trait]
impl Transport for RateGatedTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ResolverError> {
        if url.host_str().is_some_and(|h| h.eq_ignore_ascii_case(&self.host)) {
            self.gate.wait().await;
        }
        self.inner.get(url).await
    }
}

/// Read-through cache in front of a transport. Hosts registered with
/// `bypass_host` are always fetched live and never stored.
pub struct CachedFetcher {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn ResponseCache>,
    uncached_hosts: Vec<String>
}

impl CachedFetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn ResponseCache>) -> Self {
        Self { transport, cache, uncached_hosts: Vec::new() }
    }

    pub fn bypass_host(mut self, host: &str) -> Self {
        self.uncached_hosts.push(host.to_ascii_lowercase());
        self
    }

    fn should_cache(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(h) => !self.uncached_hosts.iter().any(|u| h.eq_ignore_ascii_case(u)),
            None => false
        }
    }

    pub async fn fetch(&self, url: &Url) -> Result<HttpResponse, ResolverError> {
        if !self.should_cache(url) {
            debug!(url = %url, "fetch.live");
            return self.transport.get(url).await;
        }

        let key = url.as_str();
        if let Some(body) = self.cache.get(key) {
            debug!(url = %url, "fetch.cache.hit");
            return Ok(HttpResponse::ok(body));
        }

        let resp = self.transport.get(url).await?;
        if resp.is_ok() {
            self.cache.put(key, &resp.body);
        } else {
            debug!(url = %url, status = resp.status, "fetch.not_cached");
        }
        Ok(resp)
    }
}

fn base_segments(url: &mut Url) -> Result<url::PathSegmentsMut<'_>, ResolverError> {
    let mut segments = url.path_segments_mut()
        .map_err(|_| ResolverError::Config("base url cannot hold a path".to_string()))?;
    segments.pop_if_empty();
    Ok(segments)
}

#[derive(Debug, Clone)]
pub struct ListenBrainzClient {
    pub base: Url
}

impl ListenBrainzClient {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// GET /1/user/{user}/playing-now
    pub fn playing_now_url(&self, user: &str) -> Result<Url, ResolverError> {
        let mut url = self.base.clone();
        base_segments(&mut url)?.extend(["user", user, "playing-now"]);
        Ok(url)
    }

    /// GET /1/user/{user}/listens?count=
    pub fn listens_url(&self, user: &str, count: u32) -> Result<Url, ResolverError> {
        let mut url = self.base.clone();
        base_segments(&mut url)?.extend(["user", user, "listens"]);
        url.query_pairs_mut().append_pair("count", &count.to_string());
        Ok(url)
    }
}

#[derive(Debug, Clone)]
pub struct MusicBrainzClient {
    pub base: Url
}

impl MusicBrainzClient {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// GET /ws/2/recording?fmt=json&query=...
    pub fn search_recording_url(&self, lucene: &str) -> Result<Url, ResolverError> {
        let mut url = self.base.clone();
        base_segments(&mut url)?.push("recording");
        url.query_pairs_mut()
            .append_pair("fmt", "json")
            .append_pair("query", lucene);
        Ok(url)
    }
}
