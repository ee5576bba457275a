//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Mirel CORE.
//!
//! The mirror starts with zero data but fixed limits.
//! These primitives are compiled into the binary and are immutable at runtime.

/// Magic bytes for the Mirel snapshot format header.
///
/// - File Header = Magic Bytes ("MREL") + Version (u8) before payload.
pub const MAGIC_BYTES: [u8; 4] = *b"MREL";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum nesting depth of a predicate tree.
///
/// - All queries must be computationally bounded.
/// - Applies at parse time and again during evaluation, so hand-built
///   trees hit the same ceiling as parsed ones.
pub const MAX_PREDICATE_DEPTH: usize = 32;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for attribute keys.
///
/// Keys longer than this will be rejected by the Maintainer.
/// This prevents memory exhaustion from malicious or malformed input.
pub const MAX_PROP_KEY_LENGTH: usize = 256;

/// Maximum number of attributes on a single link.
///
/// Links carrying more will be rejected by the Maintainer.
pub const MAX_PROPS_PER_LINK: usize = 1024;

/// Maximum number of links in a bulk load or snapshot import.
///
/// Larger collections will be rejected to prevent DoS.
pub const MAX_LOAD_LINKS: usize = 1_000_000;

/// Maximum number of events in a single batched apply.
///
/// Batches longer than this will be rejected to prevent DoS.
pub const MAX_EVENT_BATCH: usize = 10000;

/// Maximum snapshot payload size (500 MB).
///
/// Checked before deserializing an imported snapshot body.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, *b"MREL");
    }

    #[test]
    fn predicate_depth_is_bounded() {
        // A zero or unbounded depth would defeat the recursion guard
        assert!(MAX_PREDICATE_DEPTH >= 8);
        assert!(MAX_PREDICATE_DEPTH <= 256);
    }
}
