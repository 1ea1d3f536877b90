//! # Formats
//!
//! Pure byte-level encodings of a [`Timeline`](crate::timeline::Timeline).

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, fnv1a, timeline_checksum, timeline_from_bytes,
    timeline_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use persistence::timeline_crypto_hash;
