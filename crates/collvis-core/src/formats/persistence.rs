//! # Persistence Format
//!
//! Binary serialization for timelines. File I/O lives in the app layer.
//!
//! Format: Header (5 bytes) + postcard-serialized timeline.
//! - 4 bytes: Magic ("CVTL")
//! - 1 byte: Version
//!
//! Input is size-checked and the header validated before any payload is
//! decoded.

use crate::primitives;
use crate::timeline::Timeline;
use crate::types::CollectiveError;

/// Maximum accepted size of an encoded timeline.
///
/// The largest built-in scenario encodes to well under a megabyte.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all timeline data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), CollectiveError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(CollectiveError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(CollectiveError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CollectiveError> {
        let Some(head) = bytes.get(..HEADER_SIZE) else {
            return Err(CollectiveError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        Ok(Self {
            magic,
            version: head[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a timeline to bytes (header + payload).
pub fn timeline_to_bytes(timeline: &Timeline) -> Result<Vec<u8>, CollectiveError> {
    let header = PersistenceHeader::new();
    let payload = postcard::to_stdvec(timeline)
        .map_err(|e| CollectiveError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a timeline from bytes.
///
/// Rejects input that is too short, too large, or carries the wrong header
/// before attempting to decode the payload.
pub fn timeline_from_bytes(bytes: &[u8]) -> Result<Timeline, CollectiveError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CollectiveError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(CollectiveError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        CollectiveError::DeserializationError(format!("Failed to decode timeline: {}", e))
    })
}

// =============================================================================
// FINGERPRINTS
// =============================================================================

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// FNV-1a over the encoded timeline.
///
/// Not cryptographic: it detects accidental corruption and lets two builds
/// be compared cheaply. Identical timelines always produce the same value.
pub fn timeline_checksum(timeline: &Timeline) -> Result<u64, CollectiveError> {
    Ok(fnv1a(&timeline_to_bytes(timeline)?))
}

/// FNV-1a 64-bit.
#[must_use]
pub fn fnv1a(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// BLAKE3 hash of the encoded timeline, as 64 hex characters.
///
/// Only available with the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
pub fn timeline_crypto_hash(timeline: &Timeline) -> Result<String, CollectiveError> {
    let bytes = timeline_to_bytes(timeline)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
