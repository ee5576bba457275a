//! # Mirror Module
//!
//! The Mirror is the high-level facade over the link store: one value that
//! consumes feed events, answers queries, and reports metrics.
//!
//! - The store is a cache of upstream state, rebuildable from a bulk load
//! - Events apply atomically: a failed event leaves the mirror untouched
//! - Query results borrow the mirror, so a live result set statically
//!   blocks further mutation

use crate::engine::QueryEngine;
use crate::maintainer::Maintainer;
use crate::metrics::MirrorMetrics;
use crate::query::Predicate;
use crate::store::LinkStore;
use crate::{Link, LinkEvent, LinkId, LinkPatch, MirelError};
use serde_json::Value;

/// A Mirror combines the link store with the index maintainer and the
/// query engine.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    /// The indexed link arena.
    store: LinkStore,
}

impl Mirror {
    /// Create a new empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a mirror from a bulk dump of upstream links.
    ///
    /// Order-independent: any permutation of the same dump produces the
    /// same indices.
    ///
    /// # Errors
    ///
    /// `MirelError::DuplicateId` on repeated ids, `MirelError::InvalidLink`
    /// on attribute limit violations.
    pub fn load(links: impl IntoIterator<Item = Link>) -> Result<Self, MirelError> {
        Ok(Self {
            store: Maintainer::load(links)?,
        })
    }

    /// Wrap an existing store, e.g. one rebuilt from a snapshot.
    #[must_use]
    pub fn from_store(store: LinkStore) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &LinkStore {
        &self.store
    }

    // =========================================================================
    // FEED
    // =========================================================================

    /// Apply one upstream event.
    ///
    /// # Errors
    ///
    /// `DuplicateId` for inserts of known ids, `NotFound` for updates or
    /// deletes of unknown ids, `InvalidLink` for attribute violations. The
    /// mirror is unchanged on error.
    pub fn apply(&mut self, event: LinkEvent) -> Result<(), MirelError> {
        Maintainer::apply(&mut self.store, event)
    }

    /// Apply an ordered batch of events, stopping at the first failure.
    ///
    /// Returns the number of events applied. Already-applied events stay
    /// applied; the failing event and its successors do not.
    ///
    /// # Errors
    ///
    /// The first event error, or `InvalidLink` when the batch exceeds
    /// `MAX_EVENT_BATCH`.
    pub fn apply_all(
        &mut self,
        events: impl IntoIterator<Item = LinkEvent>,
    ) -> Result<usize, MirelError> {
        Maintainer::apply_batch(&mut self.store, events)
    }

    /// Insert a new link.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if the id is already stored.
    pub fn add(&mut self, link: Link) -> Result<(), MirelError> {
        Maintainer::add(&mut self.store, link)
    }

    /// Patch an existing link.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is absent.
    pub fn update(&mut self, id: LinkId, patch: LinkPatch) -> Result<(), MirelError> {
        Maintainer::update(&mut self.store, id, patch)
    }

    /// Remove a link, returning it.
    ///
    /// Referrers keep their references; they dangle until the id returns.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is absent.
    pub fn remove(&mut self, id: LinkId) -> Result<Link, MirelError> {
        Maintainer::remove(&mut self.store, id)
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Look up a link by id.
    #[must_use]
    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.store.get(id)
    }

    /// Check whether an id is stored.
    #[must_use]
    pub fn contains(&self, id: LinkId) -> bool {
        self.store.contains(id)
    }

    /// Iterate all links in first-insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Link> {
        self.store.all()
    }

    /// Iterate links whose type_id equals the given id.
    pub fn by_type(&self, type_id: LinkId) -> impl Iterator<Item = &Link> {
        self.store.by_type(type_id)
    }

    /// Get the number of stored links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the mirror is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // =========================================================================
    // QUERY
    // =========================================================================

    /// Evaluate a predicate, returning matches in insertion order.
    ///
    /// # Errors
    ///
    /// `MirelError::InvalidPredicate` on unset operands or excessive
    /// nesting, even when the mirror is empty.
    pub fn query(&self, predicate: &Predicate) -> Result<Vec<&Link>, MirelError> {
        QueryEngine::query(&self.store, predicate)
    }

    /// Parse a JSON predicate and evaluate it.
    ///
    /// # Errors
    ///
    /// `MirelError::InvalidPredicate` on malformed predicate documents.
    pub fn query_json(&self, predicate: &Value) -> Result<Vec<&Link>, MirelError> {
        let parsed = Predicate::parse(predicate)?;
        self.query(&parsed)
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    /// Compute metrics over the current store.
    #[must_use]
    pub fn metrics(&self) -> MirrorMetrics {
        MirrorMetrics::from_store(&self.store)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> Mirror {
        Mirror::load(vec![
            Link::new(LinkId(1)).with_type(LinkId(3)),
            Link::new(LinkId(3))
                .with_type(LinkId(3))
                .with_from(LinkId(1))
                .with_to(LinkId(2)),
            Link::new(LinkId(5))
                .with_type(LinkId(3))
                .with_from(LinkId(7))
                .with_to(LinkId(3)),
        ])
        .expect("load")
    }

    #[test]
    fn feed_events_flow_through_the_facade() {
        let mut mirror = Mirror::new();

        mirror
            .apply(LinkEvent::Insert(Link::new(LinkId(1)).with_prop("name", "a")))
            .expect("insert");
        mirror
            .apply(LinkEvent::Update(
                LinkId(1),
                LinkPatch::new().set_prop("name", "b"),
            ))
            .expect("update");

        let link = mirror.get(LinkId(1)).expect("stored");
        assert_eq!(link.props.get("name"), Some(&json!("b")));

        let removed = mirror.remove(LinkId(1)).expect("remove");
        assert_eq!(removed.id, LinkId(1));
        assert!(mirror.is_empty());
    }

    #[test]
    fn query_json_parses_and_evaluates() {
        let mirror = seeded();
        let found = mirror
            .query_json(&json!({ "id": { "_gt": 2 } }))
            .expect("query");
        let ids: Vec<u64> = found.iter().map(|link| link.id.0).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn query_json_rejects_unset_operands() {
        let mirror = seeded();
        let err = mirror.query_json(&json!({ "from_id": null }));
        assert!(matches!(err, Err(MirelError::InvalidPredicate(_))));
    }

    #[test]
    fn dangling_references_resolve_and_dangle_again() {
        let mut mirror = Mirror::new();
        mirror
            .add(Link::new(LinkId(10)).with_type(LinkId(99)))
            .expect("add");

        assert_eq!(mirror.metrics().dangling_references, 1);
        assert_eq!(mirror.store().typed(LinkId(99)).count(), 0);
        // The scalar index answers regardless of the target's existence.
        assert_eq!(mirror.by_type(LinkId(99)).count(), 1);

        mirror.add(Link::new(LinkId(99))).expect("add");
        assert_eq!(mirror.metrics().dangling_references, 0);
        assert_eq!(mirror.store().typed(LinkId(99)).count(), 1);

        mirror.remove(LinkId(99)).expect("remove");
        assert_eq!(mirror.metrics().dangling_references, 1);
        assert_eq!(mirror.store().typed(LinkId(99)).count(), 0);
    }

    #[test]
    fn apply_all_reports_the_applied_prefix() {
        let mut mirror = seeded();
        let events = vec![
            LinkEvent::Insert(Link::new(LinkId(20))),
            LinkEvent::Delete(LinkId(42)),
            LinkEvent::Insert(Link::new(LinkId(21))),
        ];

        let err = mirror.apply_all(events);
        assert!(matches!(err, Err(MirelError::NotFound(LinkId(42)))));
        // The prefix stays applied, the suffix never ran.
        assert!(mirror.contains(LinkId(20)));
        assert!(!mirror.contains(LinkId(21)));
    }
}
