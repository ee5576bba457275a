//! # Mirror Metrics
//!
//! On-demand counters over a link store for status endpoints and the CLI.
//! Computed by walking the arena; nothing here is cached or incremental.

use crate::store::LinkStore;
use serde::{Deserialize, Serialize};

// =============================================================================
// MIRROR METRICS
// =============================================================================

/// Metrics extracted from a link store for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorMetrics {
    /// Total number of stored links.
    pub link_count: usize,
    /// Total number of set scalar references (type_id, from_id, to_id).
    pub reference_count: usize,
    /// References whose target link is currently stored.
    pub resolved_references: usize,
    /// References whose target link is absent (kept verbatim, resolve
    /// retroactively when the target arrives).
    pub dangling_references: usize,
    /// Distinct type_id values in use by stored links.
    pub type_count: usize,
}

impl MirrorMetrics {
    /// Create new metrics with all zeros.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            link_count: 0,
            reference_count: 0,
            resolved_references: 0,
            dangling_references: 0,
            type_count: 0,
        }
    }

    /// Compute metrics from a store.
    #[must_use]
    pub fn from_store(store: &LinkStore) -> Self {
        let mut reference_count = 0usize;
        let mut resolved_references = 0usize;
        let mut dangling_references = 0usize;

        for link in store.all() {
            for target in link.references().into_iter().flatten() {
                reference_count = reference_count.saturating_add(1);
                if store.contains(target) {
                    resolved_references = resolved_references.saturating_add(1);
                } else {
                    dangling_references = dangling_references.saturating_add(1);
                }
            }
        }

        Self {
            link_count: store.len(),
            reference_count,
            resolved_references,
            dangling_references,
            type_count: store.distinct_type_count(),
        }
    }

    /// Resolved references as parts per thousand (integer only, no floats).
    ///
    /// A store without references reports 1000: there is nothing left to
    /// resolve.
    #[must_use]
    pub fn resolved_permille(&self) -> u64 {
        if self.reference_count == 0 {
            return 1000;
        }
        ((self.resolved_references as u64).saturating_mul(1000)) / (self.reference_count as u64)
    }
}

// =============================================================================
// TESTS
// =============================================================================
