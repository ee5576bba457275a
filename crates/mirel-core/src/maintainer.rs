//! # Index Maintainer
//!
//! Validation and incremental index maintenance for the Mirel CORE.
//!
//! - Validate input before any mutation (failed operations leave the store
//!   untouched and usable)
//! - Keep every derived index exact under insert, update, and delete
//! - Never rebuild: each event costs a handful of bucket operations
//! - No semantic inference or enrichment

use crate::primitives::{MAX_EVENT_BATCH, MAX_LOAD_LINKS, MAX_PROP_KEY_LENGTH, MAX_PROPS_PER_LINK};
use crate::store::LinkStore;
use crate::{Link, LinkEvent, LinkId, LinkPatch, MirelError};
use std::collections::BTreeSet;

/// The Maintainer owns the write path of a [`LinkStore`].
///
/// The Maintainer:
/// - Accepts change feed events and bulk collections
/// - Sanitizes and validates them
/// - Applies them atomically, one event at a time
pub struct Maintainer;

impl Maintainer {
    /// Validate a link's attributes.
    ///
    /// A link is valid if every attribute key is non-empty and within
    /// length limits, and the attribute count is within limits. References
    /// are never validated for existence; dangling is a legal state.
    pub fn validate(link: &Link) -> Result<(), MirelError> {
        if link.props.len() > MAX_PROPS_PER_LINK {
            return Err(MirelError::InvalidLink(format!(
                "link {} carries {} attributes, maximum is {}",
                link.id,
                link.props.len(),
                MAX_PROPS_PER_LINK
            )));
        }
        for key in link.props.keys() {
            validate_prop_key(key)?;
        }
        Ok(())
    }

    /// Insert a new link and wire its references into every index.
    ///
    /// Dangling references are wired like any other: their buckets simply
    /// have no stored key link yet.
    ///
    /// # Errors
    ///
    /// `MirelError::DuplicateId` if the id is already stored,
    /// `MirelError::InvalidLink` if validation fails.
    pub fn add(store: &mut LinkStore, link: Link) -> Result<(), MirelError> {
        Self::validate(&link)?;
        if store.contains(link.id) {
            return Err(MirelError::DuplicateId(link.id));
        }

        store.wire(&link);
        store.insert_slot(link);
        Ok(())
    }

    /// Apply a partial update to a stored link.
    ///
    /// Each reference field the patch changes is unwired from its old
    /// bucket and appended to the new one; unchanged fields keep their
    /// bucket positions. A `type_id` change also migrates the link's entry
    /// inside its endpoints' partition maps. Attribute operations never
    /// touch the relation indices.
    ///
    /// # Errors
    ///
    /// `MirelError::NotFound` if the id is not stored,
    /// `MirelError::InvalidLink` if an attribute operation fails validation.
    pub fn update(store: &mut LinkStore, id: LinkId, patch: LinkPatch) -> Result<(), MirelError> {
        for (key, _) in &patch.props {
            validate_prop_key(key)?;
        }

        let Some(current) = store.get(id) else {
            return Err(MirelError::NotFound(id));
        };

        let old_type = current.type_id;
        let old_from = current.from_id;
        let old_to = current.to_id;
        let new_type = patch.type_id.apply_to(old_type);
        let new_from = patch.from_id.apply_to(old_from);
        let new_to = patch.to_id.apply_to(old_to);

        // Project the post-patch attribute count before mutating.
        let mut keys: BTreeSet<&str> = current.props.keys().map(String::as_str).collect();
        for (key, op) in &patch.props {
            if op.is_some() {
                keys.insert(key.as_str());
            } else {
                keys.remove(key.as_str());
            }
        }
        if keys.len() > MAX_PROPS_PER_LINK {
            return Err(MirelError::InvalidLink(format!(
                "patch would leave link {} with {} attributes, maximum is {}",
                id,
                keys.len(),
                MAX_PROPS_PER_LINK
            )));
        }
        drop(keys);

        if let Some(link) = store.link_mut(id) {
            link.type_id = new_type;
            link.from_id = new_from;
            link.to_id = new_to;
            for (key, op) in patch.props {
                match op {
                    Some(value) => {
                        link.props.insert(key, value);
                    }
                    None => {
                        link.props.remove(&key);
                    }
                }
            }
        }

        // Type first, with the pre-patch endpoints; endpoint rewires then
        // run with the post-patch type. The partition entry ends up exactly
        // once under (new endpoint, new type).
        store.rewire_type(id, old_type, new_type, old_from, old_to);
        store.rewire_from(id, old_from, new_from, new_type);
        store.rewire_to(id, old_to, new_to, new_type);
        Ok(())
    }

    /// Remove a stored link, detaching its memberships from every index.
    ///
    /// Buckets keyed by the removed id are retained: links referencing it
    /// keep their scalar references and start dangling, and resolve again
    /// if the id is ever re-inserted.
    ///
    /// # Errors
    ///
    /// `MirelError::NotFound` if the id is not stored.
    pub fn remove(store: &mut LinkStore, id: LinkId) -> Result<Link, MirelError> {
        let link = store.remove_slot(id).ok_or(MirelError::NotFound(id))?;
        store.unwire(&link);
        Ok(link)
    }

    /// Apply one change feed event.
    pub fn apply(store: &mut LinkStore, event: LinkEvent) -> Result<(), MirelError> {
        match event {
            LinkEvent::Insert(link) => Self::add(store, link),
            LinkEvent::Update(id, patch) => Self::update(store, id, patch),
            LinkEvent::Delete(id) => Self::remove(store, id).map(|_| ()),
        }
    }

    /// Apply a batch of events in order, stopping at the first failure.
    ///
    /// Returns the number of events applied. Events before the failing one
    /// stay applied; each event is individually atomic.
    ///
    /// # Errors
    ///
    /// `MirelError::InvalidLink` if the batch exceeds `MAX_EVENT_BATCH`,
    /// otherwise the first failing event's error.
    pub fn apply_batch(
        store: &mut LinkStore,
        events: impl IntoIterator<Item = LinkEvent>,
    ) -> Result<usize, MirelError> {
        let events: Vec<LinkEvent> = events.into_iter().collect();
        if events.len() > MAX_EVENT_BATCH {
            return Err(MirelError::InvalidLink(format!(
                "batch of {} events exceeds maximum {}",
                events.len(),
                MAX_EVENT_BATCH
            )));
        }

        let mut applied = 0;
        for event in events {
            Self::apply(store, event)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Build a store from an unordered collection of links.
    ///
    /// The resulting indices equal those produced by inserting the same
    /// links one event at a time in any order: buckets are keyed by the
    /// referenced id, so forward references wire themselves without a
    /// resolution pass.
    ///
    /// # Errors
    ///
    /// `MirelError::DuplicateId` on a repeated id (no store is returned),
    /// `MirelError::InvalidLink` if the collection exceeds `MAX_LOAD_LINKS`
    /// or any link fails validation.
    pub fn load(links: impl IntoIterator<Item = Link>) -> Result<LinkStore, MirelError> {
        let links: Vec<Link> = links.into_iter().collect();
        if links.len() > MAX_LOAD_LINKS {
            return Err(MirelError::InvalidLink(format!(
                "load of {} links exceeds maximum {}",
                links.len(),
                MAX_LOAD_LINKS
            )));
        }

        let mut store = LinkStore::new();
        for link in links {
            Self::add(&mut store, link)?;
        }
        Ok(store)
    }
}

fn validate_prop_key(key: &str) -> Result<(), MirelError> {
    if key.is_empty() {
        return Err(MirelError::InvalidLink(
            "empty attribute key".to_string(),
        ));
    }
    if key.len() > MAX_PROP_KEY_LENGTH {
        return Err(MirelError::InvalidLink(format!(
            "attribute key of {} bytes exceeds maximum {}",
            key.len(),
            MAX_PROP_KEY_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
