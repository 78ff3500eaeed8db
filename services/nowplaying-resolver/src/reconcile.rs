//!
//! src/reconcile.rs
//!
//! Resolves a noisy (artist, track, release, isrc) record to one MusicBrainz
//! recording and release. Selection is driven by ordered rule tables; the
//! first rule with any matching item wins, and within a rule the database's
//! ranking decides. Accepted results are cached under the record's
//! fingerprint. Every failure ends in `Track::unmatched`, never an error.
//!

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::hasher::fingerprint;
use crate::search::{MetadataSearchClient, clean_release_name};
use crate::types::{CandidateRecording, CandidateRelease, Track, TrackMetadata};

/// One row of a selection table
pub struct Rule<T, C> {
    pub name: &'static str,
    pub matches: fn(&T, &C) -> bool
}

/// Evaluates `rules` in priority order and returns the first item that the
/// highest-priority satisfiable rule accepts, with that rule's name
pub fn select<'a, T, C>(items: &'a [T], ctx: &C, rules: &[Rule<T, C>]) ->
    Option<(&'static str, &'a T)> {
    rules.iter().find_map(|rule| {
        items.iter()
            .find(|item| (rule.matches)(item, ctx))
            .map(|item| (rule.name, item))
    })
}

fn always<T, C>(_: &T, _: &C) -> bool {
    true
}

fn carries_input_isrc(recording: &CandidateRecording, meta: &TrackMetadata) -> bool {
    meta.isrc().is_some_and(|isrc| recording.has_isrc(isrc))
}

fn digital_by_primary_artist(release: &CandidateRelease, recording: &CandidateRecording) -> bool {
    recording.primary_artist_id().is_some_and(|id| release.credits_artist(id))
        && release.is_digital()
}

pub static RECORDING_RULES: [Rule<CandidateRecording, TrackMetadata>; 2] = [
    Rule { name: "isrc", matches: carries_input_isrc },
    Rule { name: "first", matches: always },
];

pub static RELEASE_RULES: [Rule<CandidateRelease, CandidateRecording>; 2] = [
    Rule { name: "artist+digital", matches: digital_by_primary_artist },
    Rule { name: "first", matches: always },
];

/// A match stands if the release title agrees with the cleaned input
/// release name, or the recording carries the input's ISRC. With no input
/// ISRC the second check always fails and only the title can pass.
pub fn passes_gate(
    meta: &TrackMetadata,
    recording: &CandidateRecording,
    release: &CandidateRelease
) -> bool {
    let cleaned = clean_release_name(&meta.release_name);
    release.title.to_lowercase() == cleaned.to_lowercase()
        || carries_input_isrc(recording, meta)
}

pub struct Reconciler {
    search: Arc<MetadataSearchClient>,
    cache: Arc<dyn ResponseCache>,
    namespace: String
}

impl Reconciler {
    pub fn new(
        search: Arc<MetadataSearchClient>,
        cache: Arc<dyn ResponseCache>,
        namespace: impl Into<String>
    ) -> Self {
        Self { search, cache, namespace: namespace.into() }
    }

    fn cache_key(&self, meta: &TrackMetadata) -> Option<String> {
        match fingerprint(meta) {
            Ok(hex) => Some(format!("{}{hex}", self.namespace)),
            Err(e) => {
                warn!(error = %e, "resolve.fingerprint.failed");
                None
            }
        }
    }

    fn cached(&self, key: &str) -> Option<Track> {
        let body = self.cache.get(key)?;
        match serde_json::from_str(&body) {
            Ok(track) => Some(track),
            Err(e) => {
                warn!(error = %e, key = %key, "resolve.cache.corrupt");
                None
            }
        }
    }

    pub async fn resolve(&self, meta: &TrackMetadata) -> Track {
        let key = self.cache_key(meta);
        if let Some(track) = key.as_deref().and_then(|k| self.cached(k)) {
            debug!(track = %meta.track_name, "resolve.cache.hit");
            return track;
        }

        let fallback = Track::unmatched(meta);

        let candidates = match self.search.search(meta).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, track = %meta.track_name, "resolve.search.failed");
                return fallback;
            }
        };

        let Some((recording_rule, recording)) = select(&candidates, meta, &RECORDING_RULES)
        else {
            info!(track = %meta.track_name, "resolve.no_candidates");
            return fallback;
        };

        let Some((release_rule, release)) = select(&recording.releases, recording, &RELEASE_RULES)
        else {
            info!(recording = %recording.id, "resolve.no_release");
            return fallback;
        };

        if !passes_gate(meta, recording, release) {
            info!(
                track = %meta.track_name, recording = %recording.id,
                release = %release.title, "resolve.rejected"
            );
            return fallback;
        }

        let track = Track::from_recording(recording, release);
        debug!(
            recording = %track.mbid, release = %track.release.mbid,
            recording_rule, release_rule, "resolve.matched"
        );

        if let Some(key) = key {
            match serde_json::to_string(&track) {
                Ok(body) => self.cache.put(&key, &body),
                Err(e) => warn!(error = %e, "resolve.cache.encode")
            }
        }
        track
    }
}
