//! # mirel-core
//!
//! The deterministic link mirror for Mirel - THE MIRROR.
//!
//! This crate maintains an in-memory image of a remote link graph. Links
//! are records that act as both nodes and typed directed edges; the mirror
//! consumes an ordered feed of insert/update/delete events and keeps
//! adjacency and type indices incrementally consistent, including
//! references to links that have not arrived yet.
//!
//! ## Architectural Constraints
//!
//! The MIRROR:
//! - Is a cache: upstream state is authoritative, the mirror is rebuildable
//! - Is deterministic: BTreeMap only, no floats, no randomness, no clocks
//! - Is incremental: events touch only the affected index buckets
//! - Is honest about gaps: dangling references are kept verbatim and
//!   resolve retroactively when their target arrives
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod engine;
pub mod maintainer;
pub mod metrics;
pub mod mirror;
pub mod primitives;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Link, LinkEvent, LinkId, LinkPatch, MirelError, PropMap, RefPatch};

// =============================================================================
// RE-EXPORTS: Mirror Engine
// =============================================================================

pub use engine::QueryEngine;
pub use maintainer::Maintainer;
pub use metrics::MirrorMetrics;
pub use mirror::Mirror;
pub use query::{Cmp, CmpOp, FieldKey, Predicate, Relation};
pub use store::LinkStore;

// =============================================================================
// RE-EXPORTS: Snapshot Codec
// =============================================================================

pub use snapshot::{
    MirrorSnapshot, SnapshotHeader, SnapshotLink, export_snapshot, import_snapshot,
    snapshot_checksum, verify_snapshot,
};
