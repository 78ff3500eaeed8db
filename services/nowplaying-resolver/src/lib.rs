//!
//! src/lib.rs
//!
//! Resolves what a ListenBrainz user is listening to into a canonical
//! MusicBrainz track. `NowPlayingResolver` wires the listen source, the
//! reconciliation engine and the shared response cache together.
//!

pub mod config;
pub mod errors;
pub mod logging;

pub mod cache;
pub mod fetch;
pub mod hasher;
pub mod listen;
pub mod reconcile;
pub mod search;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::info;

use crate::cache::{DiskZstdCache, MemoryCache, ResponseCache};
use crate::config::{AppConfig, CacheConfig, ListenBrainzConfig, MusicBrainzConfig};
use crate::fetch::{
    CachedFetcher, ListenBrainzClient, MusicBrainzClient, RateGatedTransport,
    ReqwestTransport, Transport
};
use crate::listen::ListenSource;
use crate::reconcile::Reconciler;
use crate::search::MetadataSearchClient;

pub use crate::errors::ResolverError;
pub use crate::types::Track;

/// Cache backend selected by configuration
pub fn build_cache(cfg: &CacheConfig) -> Arc<dyn ResponseCache> {
    match &cfg.dir {
        Some(dir) => {
            info!(dir = %dir.display(), "cache.disk");
            Arc::new(DiskZstdCache::new(dir, cfg.zstd_level))
        }
        None => {
            info!("cache.memory");
            Arc::new(MemoryCache::new())
        }
    }
}

pub struct NowPlayingResolver {
    source: ListenSource
}

impl NowPlayingResolver {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ResolverError> {
        let transport = Arc::new(ReqwestTransport::new(&cfg.http, &cfg.identity)?);
        let cache = build_cache(&cfg.cache);
        Ok( Self::with_parts(&cfg.listenbrainz, &cfg.musicbrainz, &cfg.cache, transport, cache) )
    }

    /// Assembles the resolver around an explicit transport and cache handle
    pub fn with_parts(
        lb_cfg: &ListenBrainzConfig,
        mb_cfg: &MusicBrainzConfig,
        cache_cfg: &CacheConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn ResponseCache>
    ) -> Self {
        let lb = ListenBrainzClient::new(lb_cfg.base_url.clone());
        let mb = MusicBrainzClient::new(mb_cfg.base_url.clone());

        let interval = mb_cfg.min_interval();
        let transport: Arc<dyn Transport> = if interval.is_zero() {
            transport
        } else {
            Arc::new(RateGatedTransport::new(transport, mb.host(), interval))
        };

        let fetcher = Arc::new(
            CachedFetcher::new(transport, cache.clone()).bypass_host(lb.host())
        );
        let search = Arc::new(MetadataSearchClient::new(mb, fetcher.clone()));
        let reconciler = Reconciler::new(search.clone(), cache, cache_cfg.namespace.clone());

        Self { source: ListenSource::new(lb, fetcher, search, reconciler) }
    }

    /// Fails only when ListenBrainz cannot provide listen state
    pub async fn resolve(&self, user: &str) -> Result<Track, ResolverError> {
        self.source.current_track(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LB_BASE_URL, DEFAULT_MB_BASE_URL};
    use crate::testing::{FakeTransport, mb_query};
    use url::Url;

    fn resolver(transport: Arc<FakeTransport>, cache: Arc<dyn ResponseCache>) -> NowPlayingResolver {
        NowPlayingResolver::with_parts(
            &ListenBrainzConfig { base_url: Url::parse(DEFAULT_LB_BASE_URL).unwrap() },
            &MusicBrainzConfig { base_url: Url::parse(DEFAULT_MB_BASE_URL).unwrap(), max_rps: 0.0 },
            &CacheConfig::default(),
            transport,
            cache
        )
    }

    const NOW_PLAYING: &str = r#"{"payload":{"listens":[{"track_metadata":{
        "artist_name":"Band","track_name":"Hit (feat. Guest)","release_name":"LP - Deluxe",
        "additional_info":{"media_player":"web"}}}]}}"#;

    const SEARCH: &str = r#"{"recordings":[{"id":"rec-1","title":"Hit",
        "artist-credit":[{"name":"Band","joinphrase":" feat. ","artist":{"id":"art-1"}},
                         {"name":"Guest","artist":{"id":"art-2"}}],
        "releases":[{"id":"rel-1","title":"LP"}]}]}"#;

    #[tokio::test]
    async fn end_to_end_reconciles_and_caches() {
        let transport = Arc::new(FakeTransport::new()
            .route(|u| u.path().ends_with("/playing-now"), 200, NOW_PLAYING)
            .route(|u| mb_query(u) == r#"recording:"Hit" AND artist:"Band" AND release:"LP""#,
                200, SEARCH));
        let cache: Arc<dyn ResponseCache> = Arc::new(MemoryCache::new());
        let resolver = resolver(transport.clone(), cache);

        let first = resolver.resolve("someone").await.unwrap();
        let second = resolver.resolve("someone").await.unwrap();

        assert!(first.matched);
        assert_eq!(first.name, "Hit");
        assert_eq!(first.artists[0].join_phrase, " feat. ");
        assert_eq!(first.artists[1].join_phrase, " · ");
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
        assert_eq!(transport.calls_matching("/playing-now"), 2);
        assert_eq!(transport.calls_matching("/ws/2/recording"), 1);
    }

    #[tokio::test]
    async fn disk_cache_survives_a_new_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CacheConfig { dir: Some(dir.path().to_path_buf()), ..CacheConfig::default() };

        let transport = Arc::new(FakeTransport::new()
            .route(|u| u.path().ends_with("/playing-now"), 200, NOW_PLAYING)
            .route(|u| u.path() == "/ws/2/recording", 200, SEARCH));

        let first = resolver(transport.clone(), build_cache(&cfg)).resolve("u").await.unwrap();
        let second = resolver(transport.clone(), build_cache(&cfg)).resolve("u").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.calls_matching("/ws/2/recording"), 1);
    }

    #[tokio::test]
    async fn musicbrainz_is_rate_gated() {
        let transport = Arc::new(FakeTransport::new()
            .route(|u| u.path().ends_with("/playing-now"), 200, NOW_PLAYING)
            .route(|u| u.path() == "/ws/2/recording", 503, "slow down"));
        let resolver = NowPlayingResolver::with_parts(
            &ListenBrainzConfig { base_url: Url::parse(DEFAULT_LB_BASE_URL).unwrap() },
            &MusicBrainzConfig { base_url: Url::parse(DEFAULT_MB_BASE_URL).unwrap(), max_rps: 20.0 },
            &CacheConfig::default(),
            transport.clone(),
            Arc::new(MemoryCache::new())
        );

        let start = std::time::Instant::now();
        resolver.resolve("u").await.unwrap();
        resolver.resolve("u").await.unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(50));
        assert_eq!(transport.calls_matching("/ws/2/recording"), 2);
    }
}
