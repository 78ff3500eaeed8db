//!
//! src/types.rs
//!
//! Wire shapes for ListenBrainz and MusicBrainz responses, plus the
//! canonical `Track` returned to callers.
//!

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Media format tag preferred during release disambiguation
pub const DIGITAL_MEDIA: &str = "Digital Media";

/// Join phrase used when the source gives none
pub const DEFAULT_JOIN_PHRASE: &str = " · ";

/// ListenBrainz writes `null` for fields it has no value for
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ListenBrainz

#[derive(Debug, Clone, Deserialize)]
pub struct ListenEnvelope {
    pub payload: ListenPayload
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListenPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub listens: Vec<RawListen>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawListen {
    pub track_metadata: TrackMetadata
}

/// The listen's track record as ListenBrainz reports it. Serialized form
/// is what the reconciliation fingerprint is computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist_name: String,
    pub track_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_info: AdditionalInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbid_mapping: Option<MbidMapping>
}

impl TrackMetadata {
    pub fn isrc(&self) -> Option<&str> {
        self.additional_info.isrc.as_deref().filter(|s| !s.is_empty())
    }

    pub fn embedded_recording_mbid(&self) -> Option<&str> {
        self.additional_info.recording_mbid.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_mbid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_mbid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_mbids: Option<Vec<String>>,
    // everything else the submitting client attached
    #[serde(flatten)]
    pub extra: Map<String, Value>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MbidMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_mbid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_mbid: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<MappedArtist>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedArtist {
    #[serde(default, deserialize_with = "null_as_default")]
    pub artist_credit_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artist_mbid: String,
    #[serde(default)]
    pub join_phrase: Option<String>
}

// MusicBrainz

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingSearch {
    #[serde(default)]
    pub recordings: Vec<CandidateRecording>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateRecording {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "artist-credit")]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<CandidateRelease>,
    #[serde(default)]
    pub isrcs: Option<Vec<String>>
}

impl CandidateRecording {
    pub fn has_isrc(&self, isrc: &str) -> bool {
        self.isrcs.as_ref().is_some_and(|list| list.iter().any(|i| i == isrc))
    }

    /// Artist id of the first credit, the one releases are matched against
    pub fn primary_artist_id(&self) -> Option<&str> {
        self.artist_credit.first().map(|c| c.artist.id.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateRelease {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub media: Vec<Medium>,
    #[serde(default, rename = "artist-credit")]
    pub artist_credit: Option<Vec<ArtistCredit>>
}

impl CandidateRelease {
    pub fn is_digital(&self) -> bool {
        self.media.first()
            .and_then(|m| m.format.as_deref())
            .is_some_and(|f| f == DIGITAL_MEDIA)
    }

    pub fn credits_artist(&self, artist_id: &str) -> bool {
        self.artist_credit.as_ref()
            .is_some_and(|credits| credits.iter().any(|c| c.artist.id == artist_id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Medium {
    #[serde(default)]
    pub format: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistCredit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub joinphrase: Option<String>,
    pub artist: CreditedArtist
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditedArtist {
    pub id: String,
    #[serde(default)]
    pub name: String
}

// Output

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub mbid: String,
    pub matched: bool,
    pub release: TrackRelease,
    pub artists: Vec<TrackArtist>
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRelease {
    pub name: String,
    pub mbid: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackArtist {
    pub name: String,
    pub mbid: String,
    pub join_phrase: String
}

/// Empty and missing join phrases both fall back to the default
pub fn join_phrase_or_default(phrase: Option<&str>) -> String {
    match phrase {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => DEFAULT_JOIN_PHRASE.to_string()
    }
}

impl Track {
    /// The honest "could not identify" shape: raw names, no identifiers.
    pub fn unmatched(meta: &TrackMetadata) -> Self {
        Self {
            name: meta.track_name.clone(),
            mbid: String::new(),
            matched: false,
            release: TrackRelease::default(),
            artists: vec![TrackArtist {
                name: meta.artist_name.clone(),
                mbid: String::new(),
                join_phrase: String::new()
            }]
        }
    }

    /// Matched track built from a recording and the release chosen under it
    pub fn from_recording(recording: &CandidateRecording, release: &CandidateRelease) -> Self {
        Self {
            name: recording.title.clone(),
            mbid: recording.id.clone(),
            matched: true,
            release: TrackRelease {
                name: release.title.clone(),
                mbid: release.id.clone()
            },
            artists: recording.artist_credit.iter()
                .map(|credit| TrackArtist {
                    name: credit.name.clone(),
                    mbid: credit.artist.id.clone(),
                    join_phrase: join_phrase_or_default(credit.joinphrase.as_deref())
                })
                .collect()
        }
    }
}
