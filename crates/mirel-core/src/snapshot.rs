//! # Snapshot Codec
//!
//! Deterministic, bit-exact serialization of a mirror for seeding and
//! export. The mirror is a rebuildable cache; a snapshot makes that cache
//! portable without replaying the upstream feed.
//!
//! Postcard is not self-describing, so attribute values travel as
//! canonical JSON text (object keys sorted recursively). Links are sorted
//! by id, which means an imported store carries id-ordered history rather
//! than the feed order of the exporting store.

use crate::maintainer::Maintainer;
use crate::primitives::{
    FORMAT_VERSION, MAGIC_BYTES, MAX_LOAD_LINKS, MAX_SNAPSHOT_PAYLOAD_SIZE,
};
use crate::store::LinkStore;
use crate::types::PropMap;
use crate::{Link, LinkId, MirelError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Header for snapshot files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// File type marker, always [`MAGIC_BYTES`].
    pub magic: [u8; 4],

    /// Wire format revision.
    pub version: u8,

    /// Number of links in the snapshot.
    pub link_count: u64,

    /// XOR checksum over the body (deterministic, not cryptographic).
    pub checksum: u64,
}

impl SnapshotHeader {
    /// Create a new header with the given count.
    #[must_use]
    pub fn new(link_count: u64, checksum: u64) -> Self {
        Self {
            magic: MAGIC_BYTES,
            version: FORMAT_VERSION,
            link_count,
            checksum,
        }
    }

    /// Check magic and version. Messages stay generic on purpose; they
    /// can end up in responses to untrusted callers.
    pub fn validate(&self) -> Result<(), MirelError> {
        if self.magic != MAGIC_BYTES {
            return Err(MirelError::Serialization(
                "not a mirel snapshot".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(MirelError::Serialization(
                "unsupported snapshot version".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SNAPSHOT LINK (Sorted, Deterministic)
// =============================================================================

/// A link in snapshot format.
///
/// Sorted by id for deterministic ordering; attributes carried as
/// key-sorted canonical JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotLink {
    /// The link id (sort key).
    pub id: u64,

    /// Type reference, if set.
    pub type_id: Option<u64>,

    /// Source reference, if set.
    pub from_id: Option<u64>,

    /// Target reference, if set.
    pub to_id: Option<u64>,

    /// Attributes as (key, canonical JSON text), sorted by key.
    pub props: Vec<(String, String)>,
}

impl SnapshotLink {
    fn from_link(link: &Link) -> Result<Self, MirelError> {
        let mut props = Vec::with_capacity(link.props.len());
        for (key, value) in &link.props {
            props.push((key.clone(), canonical_text(value)?));
        }
        props.sort();

        Ok(Self {
            id: link.id.0,
            type_id: link.type_id.map(|id| id.0),
            from_id: link.from_id.map(|id| id.0),
            to_id: link.to_id.map(|id| id.0),
            props,
        })
    }

    fn into_link(self) -> Result<Link, MirelError> {
        let mut props = PropMap::new();
        for (key, text) in self.props {
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| MirelError::Serialization(format!("Attribute: {e}")))?;
            props.insert(key, value);
        }

        Ok(Link {
            id: LinkId(self.id),
            type_id: self.type_id.map(LinkId),
            from_id: self.from_id.map(LinkId),
            to_id: self.to_id.map(LinkId),
            props,
        })
    }
}

/// Rebuild a JSON value with object keys sorted at every level.
fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = PropMap::new();
            for (key, nested) in entries {
                sorted.insert(key.clone(), canonical_value(nested));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

fn canonical_text(value: &Value) -> Result<String, MirelError> {
    serde_json::to_string(&canonical_value(value))
        .map_err(|e| MirelError::Serialization(format!("Attribute: {e}")))
}

// =============================================================================
// MIRROR SNAPSHOT (Sorted, Deterministic)
// =============================================================================

/// A mirror in snapshot format for bit-exact serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MirrorSnapshot {
    /// Links sorted by id.
    pub links: Vec<SnapshotLink>,
}

impl MirrorSnapshot {
    /// Create a snapshot from a store.
    ///
    /// Ensures deterministic ordering by sorting all elements.
    ///
    /// # Errors
    ///
    /// `MirelError::Serialization` if an attribute cannot be rendered as
    /// canonical JSON text.
    pub fn from_store(store: &LinkStore) -> Result<Self, MirelError> {
        let mut links = store
            .all()
            .map(SnapshotLink::from_link)
            .collect::<Result<Vec<_>, _>>()?;
        links.sort();
        Ok(Self { links })
    }

    /// Rebuild a store from the snapshot, replaying links in id order.
    ///
    /// # Errors
    ///
    /// `MirelError::DuplicateId` on repeated ids, `MirelError::InvalidLink`
    /// on attribute limit violations, `MirelError::Serialization` on
    /// malformed attribute text.
    pub fn into_store(self) -> Result<LinkStore, MirelError> {
        let links = self
            .links
            .into_iter()
            .map(SnapshotLink::into_link)
            .collect::<Result<Vec<_>, _>>()?;
        Maintainer::load(links)
    }

    /// Compute a deterministic checksum of the data.
    ///
    /// XOR-based hashing: no floating point, no randomness. This is
    /// **NOT** a cryptographic hash. It detects accidental corruption and
    /// verifies export/import integrity. For tamper evidence, use the
    /// `crypto-hash` feature.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut acc: u64 = 0;

        for link in &self.links {
            acc ^= link.id.rotate_left(13);
            if let Some(type_id) = link.type_id {
                acc ^= type_id.rotate_left(7);
            }
            if let Some(from_id) = link.from_id {
                acc ^= from_id.rotate_left(17);
            }
            if let Some(to_id) = link.to_id {
                acc ^= to_id.rotate_left(11);
            }
            for (key, value) in &link.props {
                for byte in key.as_bytes() {
                    acc ^= (*byte as u64).rotate_left(23);
                }
                for byte in value.as_bytes() {
                    acc ^= (*byte as u64).rotate_left(29);
                }
            }
        }

        acc
    }
}

// =============================================================================
// EXPORT / IMPORT FUNCTIONS
// =============================================================================

/// Export a store to snapshot format.
///
/// Format:
/// ```text
/// [header_len: u32 LE] [SnapshotHeader (postcard)] [MirrorSnapshot (postcard)]
/// ```
///
/// # Errors
///
/// Returns `MirelError::Serialization` if serialization fails.
pub fn export_snapshot(store: &LinkStore) -> Result<Vec<u8>, MirelError> {
    let snapshot = MirrorSnapshot::from_store(store)?;
    let checksum = snapshot.checksum();

    let header = SnapshotHeader::new(snapshot.links.len() as u64, checksum);

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| MirelError::Serialization(format!("header: {e}")))?;
    let body_bytes = postcard::to_allocvec(&snapshot)
        .map_err(|e| MirelError::Serialization(format!("body: {e}")))?;

    let mut buf = Vec::with_capacity(4 + header_bytes.len() + body_bytes.len());
    buf.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(&body_bytes);

    Ok(buf)
}

/// Import a store from snapshot format.
///
/// Header, declared count, payload size, and checksum are all validated
/// before any link reaches the store.
///
/// # Errors
///
/// Returns `MirelError::Serialization` if the data is malformed or
/// corrupted, `MirelError::DuplicateId` if the snapshot repeats an id.
pub fn import_snapshot(data: &[u8]) -> Result<LinkStore, MirelError> {
    if data.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(MirelError::Serialization(format!(
            "payload is {} bytes, limit is {}",
            data.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let Some(prefix) = data.first_chunk::<4>() else {
        return Err(MirelError::Serialization(
            "truncated before header length".to_string(),
        ));
    };
    let header_len = u32::from_le_bytes(*prefix) as usize;
    let Some(header_bytes) = data.get(4..4 + header_len) else {
        return Err(MirelError::Serialization(
            "truncated inside header".to_string(),
        ));
    };

    let header: SnapshotHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| MirelError::Serialization(format!("header: {e}")))?;
    header.validate()?;

    // Size limit check runs BEFORE deserializing the body.
    if header.link_count > MAX_LOAD_LINKS as u64 {
        return Err(MirelError::Serialization(format!(
            "declared link count {} is over the {} limit",
            header.link_count, MAX_LOAD_LINKS
        )));
    }

    let snapshot: MirrorSnapshot = postcard::from_bytes(&data[4 + header_len..])
        .map_err(|e| MirelError::Serialization(format!("body: {e}")))?;

    let computed = snapshot.checksum();
    if computed != header.checksum {
        return Err(MirelError::Serialization(format!(
            "checksum mismatch: header says {}, body hashes to {computed}",
            header.checksum
        )));
    }

    if snapshot.links.len() as u64 != header.link_count {
        return Err(MirelError::Serialization(
            "header link count does not match body".to_string(),
        ));
    }

    snapshot.into_store()
}

/// Verify that a store matches a snapshot byte-for-byte at the canonical
/// level.
///
/// # Errors
///
/// Propagates import and canonicalization failures.
pub fn verify_snapshot(store: &LinkStore, snapshot_data: &[u8]) -> Result<bool, MirelError> {
    let imported = import_snapshot(snapshot_data)?;

    if store.len() != imported.len() {
        return Ok(false);
    }

    let original = MirrorSnapshot::from_store(store)?;
    let roundtripped = MirrorSnapshot::from_store(&imported)?;

    Ok(original == roundtripped)
}

/// Compute the snapshot checksum of a store without serializing it.
///
/// Usable as a quick equality probe between two mirrors.
///
/// # Errors
///
/// `MirelError::Serialization` if an attribute cannot be canonicalized.
pub fn snapshot_checksum(store: &LinkStore) -> Result<u64, MirelError> {
    Ok(MirrorSnapshot::from_store(store)?.checksum())
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// Compute a BLAKE3 cryptographic hash of the snapshot bytes.
///
/// Collision-resistant, complementing the XOR checksum. Returns the hash
/// as a hex string (64 characters).
///
/// Only available with the `crypto-hash` feature enabled.
///
/// # Errors
///
/// Propagates export failures.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_crypto_hash(store: &LinkStore) -> Result<String, MirelError> {
    let data = export_snapshot(store)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

/// Verify a store against a BLAKE3 hash of its snapshot.
///
/// Only available with the `crypto-hash` feature enabled.
///
/// # Errors
///
/// Propagates export failures.
#[cfg(feature = "crypto-hash")]
pub fn verify_crypto_hash(store: &LinkStore, expected_hash: &str) -> Result<bool, MirelError> {
    // Integrity verification, not authentication; timing is not a concern.
    Ok(snapshot_crypto_hash(store)? == expected_hash)
}

// =============================================================================
// TESTS
// =============================================================================
