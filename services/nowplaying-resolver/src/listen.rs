//!
//! src/listen.rs
//!
//! Reads the user's listen state from ListenBrainz and decides how far to
//! trust it. Identifiers ListenBrainz already resolved are used as-is;
//! anything else goes through the reconciliation engine and its gate.
//!

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::errors::ResolverError;
use crate::fetch::{CachedFetcher, ListenBrainzClient};
use crate::reconcile::{Reconciler, Rule, select};
use crate::search::{MetadataSearchClient, clean_release_name};
use crate::types::{
    CandidateRelease, ListenEnvelope, ListenPayload, Track, TrackArtist, TrackMetadata,
    TrackRelease, join_phrase_or_default
};

fn titled_and_digital(release: &CandidateRelease, meta: &TrackMetadata) -> bool {
    let titled = release.title == meta.release_name
        || release.title == clean_release_name(&meta.release_name);
    titled && release.is_digital()
}

fn digital(release: &CandidateRelease, _: &TrackMetadata) -> bool {
    release.is_digital()
}

fn first(_: &CandidateRelease, _: &TrackMetadata) -> bool {
    true
}

/// Release preference for a recording ListenBrainz already identified
pub static DIRECT_RELEASE_RULES: [Rule<CandidateRelease, TrackMetadata>; 3] = [
    Rule { name: "title+digital", matches: titled_and_digital },
    Rule { name: "digital", matches: digital },
    Rule { name: "first", matches: first },
];

/// Builds a track straight from ListenBrainz's own mapping of a past listen
pub fn track_from_mapping(meta: &TrackMetadata) -> Option<Track> {
    let mapping = meta.mbid_mapping.as_ref()?;
    let recording_mbid = mapping.recording_mbid.as_deref().filter(|id| !id.is_empty())?;

    Some(Track {
        name: meta.track_name.clone(),
        mbid: recording_mbid.to_string(),
        matched: true,
        release: TrackRelease {
            name: meta.release_name.clone(),
            mbid: mapping.release_mbid.clone().unwrap_or_default()
        },
        artists: mapping.artists.iter()
            .map(|a| TrackArtist {
                name: a.artist_credit_name.clone(),
                mbid: a.artist_mbid.clone(),
                join_phrase: join_phrase_or_default(a.join_phrase.as_deref())
            })
            .collect()
    })
}

pub struct ListenSource {
    lb: ListenBrainzClient,
    fetcher: Arc<CachedFetcher>,
    search: Arc<MetadataSearchClient>,
    reconciler: Reconciler
}

impl ListenSource {
    pub fn new(
        lb: ListenBrainzClient,
        fetcher: Arc<CachedFetcher>,
        search: Arc<MetadataSearchClient>,
        reconciler: Reconciler
    ) -> Self {
        Self { lb, fetcher, search, reconciler }
    }

    async fn fetch_listens(&self, url: Url) -> Result<ListenPayload, ResolverError> {
        let resp = self.fetcher.fetch(&url).await?;
        if !resp.is_ok() {
            warn!(url = %url, status = resp.status, "listen.fetch.failed");
            return Err(ResolverError::Status { url: url.to_string(), status: resp.status });
        }
        let envelope: ListenEnvelope = serde_json::from_str(&resp.body)?;
        Ok(envelope.payload)
    }

    /// The user's current track: the playing-now listen if there is one,
    /// otherwise the most recent listen.
    pub async fn current_track(&self, user: &str) -> Result<Track, ResolverError> {
        let playing = self.fetch_listens(self.lb.playing_now_url(user)?).await?;
        if let Some(listen) = playing.listens.into_iter().next() {
            let meta = listen.track_metadata;
            if let Some(mbid) = meta.embedded_recording_mbid() {
                debug!(user = %user, recording = %mbid, "listen.playing_now.direct");
                return Ok(self.direct_lookup(mbid, &meta).await);
            }
            debug!(user = %user, "listen.playing_now.reconcile");
            return Ok(self.reconciler.resolve(&meta).await);
        }

        let recent = self.fetch_listens(self.lb.listens_url(user, 1)?).await?;
        let Some(listen) = recent.listens.into_iter().next() else {
            return Err(ResolverError::NotFound(format!("no listens for user {user}")));
        };
        let meta = listen.track_metadata;

        if let Some(track) = track_from_mapping(&meta) {
            debug!(user = %user, recording = %track.mbid, "listen.recent.mapped");
            return Ok(track);
        }
        debug!(user = %user, "listen.recent.reconcile");
        Ok(self.reconciler.resolve(&meta).await)
    }

    /// Trusted path: no acceptance gate, only release disambiguation
    async fn direct_lookup(&self, recording_mbid: &str, meta: &TrackMetadata) -> Track {
        let candidates = match self.search
            .lookup_by_recording_id(recording_mbid, &meta.release_name).await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, recording = %recording_mbid, "listen.direct.failed");
                return Track::unmatched(meta);
            }
        };

        let Some(recording) = candidates.first() else {
            info!(recording = %recording_mbid, "listen.direct.empty");
            return Track::unmatched(meta);
        };
        let Some((rule, release)) = select(&recording.releases, meta, &DIRECT_RELEASE_RULES)
        else {
            info!(recording = %recording.id, "listen.direct.no_release");
            return Track::unmatched(meta);
        };

        debug!(recording = %recording.id, release = %release.id, rule, "listen.direct.matched");
        Track::from_recording(recording, release)
    }
}
