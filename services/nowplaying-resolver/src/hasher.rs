//!
//! src/hasher.rs
//!
//! Content fingerprints used as cache keys. A fingerprint is only ever
//! compared for key lookup, never for meaning: two equivalent records that
//! serialize differently simply miss each other in the cache.
//!

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 over the record's JSON serialization
pub fn fingerprint<T: Serialize>(record: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(record)?;
    Ok(sha256_hex(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackMetadata;

    fn meta(json: &str) -> TrackMetadata {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = meta(r#"{"artist_name":"A","track_name":"T","release_name":"R"}"#);
        let first = fingerprint(&a).unwrap();
        let second = fingerprint(&a.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_covers_extra_info() {
        let a = meta(r#"{"artist_name":"A","track_name":"T","release_name":"R",
            "additional_info":{"media_player":"x"}}"#);
        let b = meta(r#"{"artist_name":"A","track_name":"T","release_name":"R",
            "additional_info":{"media_player":"y"}}"#);
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn extra_key_order_does_not_matter_after_parsing() {
        let a = meta(r#"{"artist_name":"A","track_name":"T","release_name":"R",
            "additional_info":{"k1":1,"k2":2}}"#);
        let b = meta(r#"{"release_name":"R","track_name":"T","artist_name":"A",
            "additional_info":{"k2":2,"k1":1}}"#);
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }
}
