//!
//! src/search.rs
//!
//! Builds MusicBrainz recording queries from a listen's track metadata and
//! returns the candidates in the database's own ranking.
//!

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::errors::SearchFailure;
use crate::fetch::{CachedFetcher, MusicBrainzClient};
use crate::types::{CandidateRecording, RecordingSearch, TrackMetadata};

// "- EP", "- Single", "- Deluxe" ...
static RELEASE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*-\s*[^-]+$").unwrap()
});

static FEATURING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\(feat\. [^)]+\)").unwrap()
});

/// Drops the first "(feat. ...)" group
pub fn strip_featuring(name: &str) -> String {
    FEATURING.replace(name, "").into_owned()
}

/// Release name as it is compared and queried: trailing " - suffix" and
/// the first "(feat. ...)" group removed
pub fn clean_release_name(name: &str) -> String {
    let without_suffix = RELEASE_SUFFIX.replace(name, "");
    FEATURING.replace(&without_suffix, "").into_owned()
}

/// Boolean recording query. An ISRC, when present, is OR-ed with the
/// name triple so either can surface the recording.
pub fn build_recording_query(meta: &TrackMetadata) -> String {
    let triple = format!(
        r#"recording:"{}" AND artist:"{}" AND release:"{}""#,
        strip_featuring(&meta.track_name),
        meta.artist_name,
        clean_release_name(&meta.release_name)
    );
    match meta.isrc() {
        Some(isrc) => format!("isrc:{isrc} OR ({triple})"),
        None => triple
    }
}

/// Query for a recording the listen service already identified
pub fn build_recording_id_query(recording_mbid: &str, release_name: &str) -> String {
    format!("rid:{recording_mbid} AND release:({release_name})")
}

pub struct MetadataSearchClient {
    mb: MusicBrainzClient,
    fetcher: Arc<CachedFetcher>
}

impl MetadataSearchClient {
    pub fn new(mb: MusicBrainzClient, fetcher: Arc<CachedFetcher>) -> Self {
        Self { mb, fetcher }
    }

    pub async fn search(&self, meta: &TrackMetadata) ->
        Result<Vec<CandidateRecording>, SearchFailure> {
        self.query(&build_recording_query(meta)).await
    }

    pub async fn lookup_by_recording_id(&self, recording_mbid: &str, release_name: &str) ->
        Result<Vec<CandidateRecording>, SearchFailure> {
        self.query(&build_recording_id_query(recording_mbid, release_name)).await
    }

    async fn query(&self, lucene: &str) -> Result<Vec<CandidateRecording>, SearchFailure> {
        let url = self.mb.search_recording_url(lucene)?;
        debug!(query = %lucene, "search.query");

        let resp = self.fetcher.fetch(&url).await?;
        if !resp.is_ok() {
            return Err(SearchFailure::Status(resp.status));
        }
        let parsed: RecordingSearch = serde_json::from_str(&resp.body)?;
        debug!(candidates = parsed.recordings.len(), "search.done");
        Ok(parsed.recordings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::{FakeTransport, mb_query};
    use url::Url;

    fn meta(json: &str) -> TrackMetadata {
        serde_json::from_str(json).unwrap()
    }

    fn client(transport: Arc<FakeTransport>) -> MetadataSearchClient {
        let fetcher = CachedFetcher::new(transport, Arc::new(MemoryCache::new()));
        MetadataSearchClient::new(
            MusicBrainzClient::new(Url::parse("https://musicbrainz.org/ws/2/").unwrap()),
            Arc::new(fetcher)
        )
    }

    #[test]
    fn cleans_release_suffixes() {
        assert_eq!(clean_release_name("Album Name - Deluxe"), "Album Name");
        assert_eq!(clean_release_name("Currents - EP"), "Currents");
        assert_eq!(clean_release_name("Hit (feat. Someone) - Single"), "Hit");
        assert_eq!(clean_release_name("Plain Album"), "Plain Album");
        assert_eq!(clean_release_name(""), "");
    }

    #[test]
    fn strips_featuring_case_insensitively() {
        assert_eq!(strip_featuring("Song (feat. Someone)"), "Song");
        assert_eq!(strip_featuring("Song (FEAT. Someone) Remix"), "Song Remix");
        assert_eq!(strip_featuring("Song (featuring Someone)"), "Song (featuring Someone)");
    }

    #[test]
    fn query_without_isrc() {
        let m = meta(r#"{"artist_name":"Artist","track_name":"Song (feat. Someone)",
            "release_name":"Album Name - Deluxe"}"#);
        assert_eq!(
            build_recording_query(&m),
            r#"recording:"Song" AND artist:"Artist" AND release:"Album Name""#
        );
        // the record itself keeps the raw names
        assert_eq!(m.track_name, "Song (feat. Someone)");
    }

    #[test]
    fn query_with_isrc() {
        let m = meta(r#"{"artist_name":"Tame Impala","track_name":"Breathe Deeper",
            "release_name":"The Slow Rush","additional_info":{"isrc":"AUUM71900929"}}"#);
        assert_eq!(
            build_recording_query(&m),
            r#"isrc:AUUM71900929 OR (recording:"Breathe Deeper" AND artist:"Tame Impala" AND release:"The Slow Rush")"#
        );
    }

    #[test]
    fn recording_id_query() {
        assert_eq!(
            build_recording_id_query("abc-123", "Greatest Hits"),
            "rid:abc-123 AND release:(Greatest Hits)"
        );
    }

    #[tokio::test]
    async fn search_returns_candidates_in_database_order() {
        let transport = Arc::new(FakeTransport::new().route(
            |u| mb_query(u).starts_with("recording:"),
            200,
            r#"{"recordings":[{"id":"r2","title":"B"},{"id":"r1","title":"A"}]}"#
        ));
        let m = meta(r#"{"artist_name":"X","track_name":"A","release_name":"R"}"#);
        let found = client(transport).search(&m).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r2", "r1"]);
    }

    #[tokio::test]
    async fn search_failures() {
        let m = meta(r#"{"artist_name":"X","track_name":"A","release_name":"R"}"#);

        let status = Arc::new(FakeTransport::new().route(|_| true, 503, "busy"));
        assert!(matches!(client(status).search(&m).await, Err(SearchFailure::Status(503))));

        let garbage = Arc::new(FakeTransport::new().route(|_| true, 200, "<html>"));
        assert!(matches!(client(garbage).search(&m).await, Err(SearchFailure::Decode(_))));

        let down = Arc::new(FakeTransport::new().unreachable(|_| true));
        assert!(matches!(client(down).search(&m).await, Err(SearchFailure::Transport(_))));
    }
}
