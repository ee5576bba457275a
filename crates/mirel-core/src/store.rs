//! # Link Store
//!
//! The deterministic link storage for the Mirel CORE.
//!
//! One arena of records plus every derived index. All data structures use
//! `BTreeMap` for deterministic ordering.
//!
//! ## Index layout
//!
//! Adjacency buckets are keyed by the *referenced* id, not the referencing
//! link: `outgoing[x]` holds the links whose `from_id` is `x`, whether or
//! not `x` itself is stored. A bucket may therefore exist before its key
//! link does and survives the key link's deletion. That single property is
//! what makes dangling references resolve retroactively and bulk loads
//! order-independent.
//!
//! Relation views (`type_of`, `typed`, `out_of`, ...) are existence-guarded:
//! an id that is not stored exposes nothing, no matter what the buckets
//! hold for it. `by_type` is the one unguarded read, because it is a scalar
//! index query ("links whose `type_id` is x"), not a view of link x.
//!
//! Mutation goes through the Index Maintainer; this module only exposes
//! crate-internal wiring primitives.

use crate::{Link, LinkId};
use std::collections::BTreeMap;

// =============================================================================
// STORAGE TYPES
// =============================================================================

/// An arena slot: the link plus its insertion sequence number.
#[derive(Debug, Clone)]
struct Slot {
    link: Link,
    seq: u64,
}

/// The main link store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
/// No `HashMap` allowed.
#[derive(Debug, Clone, Default)]
pub struct LinkStore {
    /// Record storage: LinkId -> slot.
    records: BTreeMap<LinkId, Slot>,

    /// Insertion order: sequence -> LinkId. A removed and re-inserted id
    /// takes a fresh sequence at the end.
    order: BTreeMap<u64, LinkId>,

    /// Next insertion sequence.
    next_seq: u64,

    /// type_id -> links carrying that type_id, in wire order.
    by_type: BTreeMap<LinkId, Vec<LinkId>>,

    /// from_id -> links leaving that id (`out` of the key link).
    outgoing: BTreeMap<LinkId, Vec<LinkId>>,

    /// to_id -> links arriving at that id (`in` of the key link).
    incoming: BTreeMap<LinkId, Vec<LinkId>>,

    /// from_id -> member type_id -> members (`out` partitioned by type).
    /// Untyped members appear in `outgoing` but in no partition.
    out_by_type: BTreeMap<LinkId, BTreeMap<LinkId, Vec<LinkId>>>,

    /// to_id -> member type_id -> members (`in` partitioned by type).
    in_by_type: BTreeMap<LinkId, BTreeMap<LinkId, Vec<LinkId>>>,
}

impl LinkStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // READ API
    // =========================================================================

    /// Look up a link by id.
    #[must_use]
    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.records.get(&id).map(|slot| &slot.link)
    }

    /// Check whether an id is stored.
    #[must_use]
    pub fn contains(&self, id: LinkId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of stored links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All links in first-insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Link> {
        self.order.values().filter_map(|id| self.get(*id))
    }

    /// All links in ascending id order.
    pub fn iter_by_id(&self) -> impl Iterator<Item = &Link> {
        self.records.values().map(|slot| &slot.link)
    }

    /// Links whose `type_id` equals the argument, in index order.
    ///
    /// Defined for any id; the type link itself need not be stored.
    pub fn by_type(&self, type_id: LinkId) -> impl Iterator<Item = &Link> {
        self.members(self.by_type.get(&type_id))
    }

    // =========================================================================
    // RELATION VIEWS (existence-guarded)
    // =========================================================================

    /// The resolved type of a stored link, if its `type_id` is set and the
    /// target is stored.
    #[must_use]
    pub fn type_of(&self, id: LinkId) -> Option<&Link> {
        self.get(self.get(id)?.type_id?)
    }

    /// The resolved source endpoint of a stored link.
    #[must_use]
    pub fn from_of(&self, id: LinkId) -> Option<&Link> {
        self.get(self.get(id)?.from_id?)
    }

    /// The resolved target endpoint of a stored link.
    #[must_use]
    pub fn to_of(&self, id: LinkId) -> Option<&Link> {
        self.get(self.get(id)?.to_id?)
    }

    /// Links typed by a stored link. Empty when `id` is not stored.
    pub fn typed(&self, id: LinkId) -> impl Iterator<Item = &Link> {
        self.members(self.guarded(id, &self.by_type))
    }

    /// Links leaving a stored link (`from_id == id`).
    pub fn out_of(&self, id: LinkId) -> impl Iterator<Item = &Link> {
        self.members(self.guarded(id, &self.outgoing))
    }

    /// Links arriving at a stored link (`to_id == id`).
    pub fn in_of(&self, id: LinkId) -> impl Iterator<Item = &Link> {
        self.members(self.guarded(id, &self.incoming))
    }

    /// The `type_id = type_id` slice of `out_of(id)`.
    pub fn out_of_typed(&self, id: LinkId, type_id: LinkId) -> impl Iterator<Item = &Link> {
        self.members(self.guarded_partition(id, type_id, &self.out_by_type))
    }

    /// The `type_id = type_id` slice of `in_of(id)`.
    pub fn in_of_typed(&self, id: LinkId, type_id: LinkId) -> impl Iterator<Item = &Link> {
        self.members(self.guarded_partition(id, type_id, &self.in_by_type))
    }

    /// `(type_id, member ids)` partitions of `out_of(id)`.
    pub fn out_partitions(&self, id: LinkId) -> impl Iterator<Item = (LinkId, &[LinkId])> {
        Self::partitions_view(if self.contains(id) {
            self.out_by_type.get(&id)
        } else {
            None
        })
    }

    /// `(type_id, member ids)` partitions of `in_of(id)`.
    pub fn in_partitions(&self, id: LinkId) -> impl Iterator<Item = (LinkId, &[LinkId])> {
        Self::partitions_view(if self.contains(id) {
            self.in_by_type.get(&id)
        } else {
            None
        })
    }

    fn guarded<'a>(&self, id: LinkId, buckets: &'a Buckets) -> Option<&'a Vec<LinkId>> {
        if self.contains(id) {
            buckets.get(&id)
        } else {
            None
        }
    }

    fn guarded_partition<'a>(
        &self,
        id: LinkId,
        type_id: LinkId,
        partitions: &'a Partitions,
    ) -> Option<&'a Vec<LinkId>> {
        if self.contains(id) {
            partitions.get(&id)?.get(&type_id)
        } else {
            None
        }
    }

    fn members<'a>(&'a self, ids: Option<&'a Vec<LinkId>>) -> impl Iterator<Item = &'a Link> {
        ids.into_iter().flatten().filter_map(|id| self.get(*id))
    }

    fn partitions_view(
        partitions: Option<&BTreeMap<LinkId, Vec<LinkId>>>,
    ) -> impl Iterator<Item = (LinkId, &[LinkId])> {
        partitions
            .into_iter()
            .flatten()
            .map(|(type_id, members)| (*type_id, members.as_slice()))
    }

    // =========================================================================
    // CRATE-INTERNAL READS (query planning, metrics)
    // =========================================================================

    /// Ids whose `type_id` equals the key. Unguarded scalar index.
    pub(crate) fn type_members(&self, type_id: LinkId) -> &[LinkId] {
        self.by_type.get(&type_id).map_or(&[], Vec::as_slice)
    }

    /// Ids whose `from_id` equals the key. Unguarded scalar index.
    pub(crate) fn from_members(&self, from_id: LinkId) -> &[LinkId] {
        self.outgoing.get(&from_id).map_or(&[], Vec::as_slice)
    }

    /// Ids whose `to_id` equals the key. Unguarded scalar index.
    pub(crate) fn to_members(&self, to_id: LinkId) -> &[LinkId] {
        self.incoming.get(&to_id).map_or(&[], Vec::as_slice)
    }

    /// Insertion sequence of a stored id.
    pub(crate) fn seq_of(&self, id: LinkId) -> Option<u64> {
        self.records.get(&id).map(|slot| slot.seq)
    }

    /// Number of distinct `type_id` values currently in use.
    pub(crate) fn distinct_type_count(&self) -> usize {
        self.by_type.len()
    }

    // =========================================================================
    // CRATE-INTERNAL WIRING (Maintainer only)
    // =========================================================================

    /// Register a record, assigning the next insertion sequence.
    /// The caller guarantees the id is not stored.
    pub(crate) fn insert_slot(&mut self, link: Link) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.order.insert(seq, link.id);
        self.records.insert(link.id, Slot { link, seq });
    }

    /// Unregister a record, returning the link.
    pub(crate) fn remove_slot(&mut self, id: LinkId) -> Option<Link> {
        let slot = self.records.remove(&id)?;
        self.order.remove(&slot.seq);
        Some(slot.link)
    }

    /// Mutable access to a stored link (attribute and reference updates).
    /// Index buckets are NOT adjusted; callers rewire explicitly.
    pub(crate) fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.records.get_mut(&id).map(|slot| &mut slot.link)
    }

    /// Wire a link's set references into every index.
    pub(crate) fn wire(&mut self, link: &Link) {
        if let Some(t) = link.type_id {
            bucket_push(&mut self.by_type, t, link.id);
        }
        if let Some(f) = link.from_id {
            bucket_push(&mut self.outgoing, f, link.id);
            if let Some(t) = link.type_id {
                partition_push(&mut self.out_by_type, f, t, link.id);
            }
        }
        if let Some(to) = link.to_id {
            bucket_push(&mut self.incoming, to, link.id);
            if let Some(t) = link.type_id {
                partition_push(&mut self.in_by_type, to, t, link.id);
            }
        }
    }

    /// Detach a link's own memberships from every index.
    /// Buckets keyed by the link's id are deliberately left alone.
    pub(crate) fn unwire(&mut self, link: &Link) {
        if let Some(t) = link.type_id {
            bucket_remove(&mut self.by_type, t, link.id);
        }
        if let Some(f) = link.from_id {
            bucket_remove(&mut self.outgoing, f, link.id);
            if let Some(t) = link.type_id {
                partition_remove(&mut self.out_by_type, f, t, link.id);
            }
        }
        if let Some(to) = link.to_id {
            bucket_remove(&mut self.incoming, to, link.id);
            if let Some(t) = link.type_id {
                partition_remove(&mut self.in_by_type, to, t, link.id);
            }
        }
    }

    /// Move a link between type buckets and between the partitions under
    /// its current endpoints. Endpoint arguments are the values *before*
    /// any endpoint rewire in the same patch.
    pub(crate) fn rewire_type(
        &mut self,
        id: LinkId,
        old: Option<LinkId>,
        new: Option<LinkId>,
        from_id: Option<LinkId>,
        to_id: Option<LinkId>,
    ) {
        if old == new {
            return;
        }
        if let Some(t) = old {
            bucket_remove(&mut self.by_type, t, id);
            if let Some(f) = from_id {
                partition_remove(&mut self.out_by_type, f, t, id);
            }
            if let Some(to) = to_id {
                partition_remove(&mut self.in_by_type, to, t, id);
            }
        }
        if let Some(t) = new {
            bucket_push(&mut self.by_type, t, id);
            if let Some(f) = from_id {
                partition_push(&mut self.out_by_type, f, t, id);
            }
            if let Some(to) = to_id {
                partition_push(&mut self.in_by_type, to, t, id);
            }
        }
    }

    /// Move a link between outgoing buckets. `type_id` is the value *after*
    /// any type rewire in the same patch.
    pub(crate) fn rewire_from(
        &mut self,
        id: LinkId,
        old: Option<LinkId>,
        new: Option<LinkId>,
        type_id: Option<LinkId>,
    ) {
        if old == new {
            return;
        }
        if let Some(f) = old {
            bucket_remove(&mut self.outgoing, f, id);
            if let Some(t) = type_id {
                partition_remove(&mut self.out_by_type, f, t, id);
            }
        }
        if let Some(f) = new {
            bucket_push(&mut self.outgoing, f, id);
            if let Some(t) = type_id {
                partition_push(&mut self.out_by_type, f, t, id);
            }
        }
    }

    /// Move a link between incoming buckets. `type_id` is the value *after*
    /// any type rewire in the same patch.
    pub(crate) fn rewire_to(
        &mut self,
        id: LinkId,
        old: Option<LinkId>,
        new: Option<LinkId>,
        type_id: Option<LinkId>,
    ) {
        if old == new {
            return;
        }
        if let Some(to) = old {
            bucket_remove(&mut self.incoming, to, id);
            if let Some(t) = type_id {
                partition_remove(&mut self.in_by_type, to, t, id);
            }
        }
        if let Some(to) = new {
            bucket_push(&mut self.incoming, to, id);
            if let Some(t) = type_id {
                partition_push(&mut self.in_by_type, to, t, id);
            }
        }
    }
}

// =============================================================================
// BUCKET PRIMITIVES
// =============================================================================

type Buckets = BTreeMap<LinkId, Vec<LinkId>>;
type Partitions = BTreeMap<LinkId, BTreeMap<LinkId, Vec<LinkId>>>;

fn bucket_push(buckets: &mut Buckets, key: LinkId, member: LinkId) {
    buckets.entry(key).or_default().push(member);
}

/// Remove a member and prune the bucket when it empties.
fn bucket_remove(buckets: &mut Buckets, key: LinkId, member: LinkId) {
    if let Some(members) = buckets.get_mut(&key) {
        members.retain(|m| *m != member);
        if members.is_empty() {
            buckets.remove(&key);
        }
    }
}

fn partition_push(partitions: &mut Partitions, owner: LinkId, type_id: LinkId, member: LinkId) {
    partitions
        .entry(owner)
        .or_default()
        .entry(type_id)
        .or_default()
        .push(member);
}

/// Remove a member and prune empty partitions and owners.
fn partition_remove(partitions: &mut Partitions, owner: LinkId, type_id: LinkId, member: LinkId) {
    if let Some(by_type) = partitions.get_mut(&owner) {
        if let Some(members) = by_type.get_mut(&type_id) {
            members.retain(|m| *m != member);
            if members.is_empty() {
                by_type.remove(&type_id);
            }
        }
        if by_type.is_empty() {
            partitions.remove(&owner);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
