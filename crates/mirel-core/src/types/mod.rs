//! # Core Type Definitions
//!
//! This module contains all core types for the Mirel link mirror:
//! - Link identifiers (`LinkId`)
//! - The link record itself (`Link`, `PropMap`)
//! - Change feed vocabulary (`LinkEvent`, `LinkPatch`, `RefPatch`)
//! - Error types (`MirelError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer identifiers only (attributes are opaque JSON)
//! - Implement `Ord` where they serve as `BTreeMap` keys
//! - Carry no interior mutability and no ambient state

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// LINK IDENTIFIER
// =============================================================================

/// Unique identifier for a link in the mirrored dataset.
///
/// Ids are assigned upstream; the mirror never invents them. A link that
/// references an id not (yet) present in the mirror simply dangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// LINK
// =============================================================================

/// The opaque attribute bag carried by a link.
///
/// Attributes arrive as JSON and stay JSON. The store never inspects them;
/// only the query engine compares them, as scalars.
pub type PropMap = serde_json::Map<String, serde_json::Value>;

/// A Link is the single record kind of the mirrored dataset.
///
/// Nodes and typed directed edges are the same thing: a link with no
/// endpoint references is a node, a link with `from_id`/`to_id` set is an
/// edge, and `type_id` points at another link that acts as its type. Any
/// reference may dangle; the scalar is kept verbatim and the derived views
/// resolve to nothing until the target arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// The upstream-assigned identifier.
    pub id: LinkId,
    /// Reference to the link acting as this link's type, if any.
    pub type_id: Option<LinkId>,
    /// Source endpoint reference, if any.
    pub from_id: Option<LinkId>,
    /// Target endpoint reference, if any.
    pub to_id: Option<LinkId>,
    /// Opaque attributes.
    #[serde(default)]
    pub props: PropMap,
}

impl Link {
    /// Create a new link with no references and no attributes.
    #[must_use]
    pub fn new(id: LinkId) -> Self {
        Self {
            id,
            type_id: None,
            from_id: None,
            to_id: None,
            props: PropMap::new(),
        }
    }

    /// Set the type reference.
    #[must_use]
    pub fn with_type(mut self, type_id: LinkId) -> Self {
        self.type_id = Some(type_id);
        self
    }

    /// Set the source endpoint reference.
    #[must_use]
    pub fn with_from(mut self, from_id: LinkId) -> Self {
        self.from_id = Some(from_id);
        self
    }

    /// Set the target endpoint reference.
    #[must_use]
    pub fn with_to(mut self, to_id: LinkId) -> Self {
        self.to_id = Some(to_id);
        self
    }

    /// Attach an attribute.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// The reference fields that are set, in (type, from, to) order.
    #[must_use]
    pub fn references(&self) -> [Option<LinkId>; 3] {
        [self.type_id, self.from_id, self.to_id]
    }
}

// =============================================================================
// PATCHES
// =============================================================================

/// One reference field of a patch.
///
/// `Keep` leaves the field untouched, `Clear` unsets it, `Set` rewires it.
/// The three-way split exists because the wire format distinguishes an
/// absent key (keep) from an explicit `null` (clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefPatch {
    /// Leave the field as it is.
    #[default]
    Keep,
    /// Unset the field.
    Clear,
    /// Point the field at the given id.
    Set(LinkId),
}

impl RefPatch {
    /// Resolve this patch against the field's current value.
    #[must_use]
    pub fn apply_to(self, current: Option<LinkId>) -> Option<LinkId> {
        match self {
            RefPatch::Keep => current,
            RefPatch::Clear => None,
            RefPatch::Set(id) => Some(id),
        }
    }
}

/// A partial update to a stored link. Patches never change the id.
///
/// Attribute operations are per-key: `(key, Some(value))` sets the key,
/// `(key, None)` removes it. Keys the patch does not mention are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkPatch {
    /// Type reference change.
    pub type_id: RefPatch,
    /// Source endpoint change.
    pub from_id: RefPatch,
    /// Target endpoint change.
    pub to_id: RefPatch,
    /// Per-key attribute operations, applied in order.
    pub props: Vec<(String, Option<serde_json::Value>)>,
}

impl LinkPatch {
    /// Create an empty patch (applies as a no-op).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewire the type reference.
    #[must_use]
    pub fn set_type(mut self, type_id: LinkId) -> Self {
        self.type_id = RefPatch::Set(type_id);
        self
    }

    /// Unset the type reference.
    #[must_use]
    pub fn clear_type(mut self) -> Self {
        self.type_id = RefPatch::Clear;
        self
    }

    /// Rewire the source endpoint.
    #[must_use]
    pub fn set_from(mut self, from_id: LinkId) -> Self {
        self.from_id = RefPatch::Set(from_id);
        self
    }

    /// Unset the source endpoint.
    #[must_use]
    pub fn clear_from(mut self) -> Self {
        self.from_id = RefPatch::Clear;
        self
    }

    /// Rewire the target endpoint.
    #[must_use]
    pub fn set_to(mut self, to_id: LinkId) -> Self {
        self.to_id = RefPatch::Set(to_id);
        self
    }

    /// Unset the target endpoint.
    #[must_use]
    pub fn clear_to(mut self) -> Self {
        self.to_id = RefPatch::Clear;
        self
    }

    /// Set an attribute key.
    #[must_use]
    pub fn set_prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.push((key.into(), Some(value.into())));
        self
    }

    /// Remove an attribute key.
    #[must_use]
    pub fn remove_prop(mut self, key: impl Into<String>) -> Self {
        self.props.push((key.into(), None));
        self
    }
}

// =============================================================================
// CHANGE FEED EVENTS
// =============================================================================

/// One event of the upstream change feed.
///
/// The feed is ordered; the mirror applies events one at a time and each
/// event is atomic (a failed event leaves the store untouched).
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A link came into existence upstream.
    Insert(Link),
    /// A stored link changed.
    Update(LinkId, LinkPatch),
    /// A stored link went away. References to it start dangling.
    Delete(LinkId),
}

impl LinkEvent {
    /// The id this event is about.
    #[must_use]
    pub fn link_id(&self) -> LinkId {
        match self {
            LinkEvent::Insert(link) => link.id,
            LinkEvent::Update(id, _) | LinkEvent::Delete(id) => *id,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Mirel system.
///
/// - No silent failures
/// - Use `Result<T, MirelError>` for fallible operations
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum MirelError {
    /// A link, patch, or batch failed a validation limit.
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// An insert or bulk load carried an id that is already stored.
    #[error("Duplicate link id: {0}")]
    DuplicateId(LinkId),

    /// The requested link is not in the store.
    #[error("Link not found: {0}")]
    NotFound(LinkId),

    /// A predicate is malformed or carries an unset operand.
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred in a host layer.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
