//! # Query Engine
//!
//! Predicate evaluation over the link store.
//!
//! - Conjunctive matching: every scalar and relation condition must hold
//! - Singular relations (`type`, `from`, `to`) require the target to exist
//!   and match; set relations (`typed`, `in`, `out`) require one member
//! - Attribute comparison follows the upstream client: numbers compare
//!   numerically, strings lexicographically, kind mismatches fail the
//!   condition without failing the query, unset fields satisfy only the
//!   negated operators
//!
//! ## Planning
//!
//! A top-level equality on `id` resolves through the arena; an equality on
//! `type_id`, `from_id`, or `to_id` picks the smallest matching index
//! bucket; everything else scans. Index candidates are re-ordered by
//! insertion sequence before filtering, so the planner is semantically
//! invisible: identical results, identical order.

use crate::primitives::MAX_PREDICATE_DEPTH;
use crate::query::{validate_operand, Cmp, CmpOp, FieldKey, Predicate, Relation};
use crate::store::LinkStore;
use crate::{Link, LinkId, MirelError};
use serde_json::Value;
use std::cmp::Ordering;

// =============================================================================
// ENGINE
// =============================================================================

/// The QueryEngine evaluates predicates against a [`LinkStore`].
pub struct QueryEngine;

impl QueryEngine {
    /// Evaluate a predicate, returning matching links in insertion order.
    ///
    /// Results borrow the store, which statically pins it against mutation
    /// while a result set is alive.
    ///
    /// # Errors
    ///
    /// `MirelError::InvalidPredicate` if the tree carries an unset operand
    /// or exceeds `MAX_PREDICATE_DEPTH`. Validation runs before any
    /// matching, so a bad predicate fails even on an empty store.
    pub fn query<'a>(
        store: &'a LinkStore,
        predicate: &Predicate,
    ) -> Result<Vec<&'a Link>, MirelError> {
        validate_tree(predicate, 0)?;

        let links = match plan(store, predicate) {
            Plan::ById(id) => store
                .get(id)
                .into_iter()
                .filter(|link| link_matches(store, link, predicate))
                .collect(),
            Plan::Bucket(mut ids) => {
                ids.sort_by_key(|id| store.seq_of(*id).unwrap_or(u64::MAX));
                ids.iter()
                    .filter_map(|id| store.get(*id))
                    .filter(|link| link_matches(store, link, predicate))
                    .collect()
            }
            Plan::Scan => store
                .all()
                .filter(|link| link_matches(store, link, predicate))
                .collect(),
        };
        Ok(links)
    }

    /// Evaluate a predicate against a single link.
    ///
    /// # Errors
    ///
    /// Same validation as [`QueryEngine::query`].
    pub fn matches(store: &LinkStore, link: &Link, predicate: &Predicate) -> Result<bool, MirelError> {
        validate_tree(predicate, 0)?;
        Ok(link_matches(store, link, predicate))
    }
}

// =============================================================================
// PLANNING
// =============================================================================

enum Plan {
    /// A top-level id equality: at most one candidate.
    ById(LinkId),
    /// Candidates from the smallest matching reference bucket.
    Bucket(Vec<LinkId>),
    /// Full scan in insertion order.
    Scan,
}

fn plan(store: &LinkStore, predicate: &Predicate) -> Plan {
    let mut best: Option<Vec<LinkId>> = None;

    for (field, cmps) in &predicate.fields {
        for cmp in cmps {
            if cmp.op != CmpOp::Eq {
                continue;
            }
            let Some(operand) = cmp.operand.as_u64() else {
                continue;
            };
            let id = LinkId(operand);
            match field {
                FieldKey::Id => return Plan::ById(id),
                FieldKey::TypeId => consider(&mut best, store.type_members(id)),
                FieldKey::FromId => consider(&mut best, store.from_members(id)),
                FieldKey::ToId => consider(&mut best, store.to_members(id)),
                FieldKey::Prop(_) => {}
            }
        }
    }

    best.map_or(Plan::Scan, Plan::Bucket)
}

fn consider(best: &mut Option<Vec<LinkId>>, members: &[LinkId]) {
    if best.as_ref().is_none_or(|current| members.len() < current.len()) {
        *best = Some(members.to_vec());
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Walk the tree once before matching, so hand-built predicates fail the
/// same way parsed ones do.
fn validate_tree(predicate: &Predicate, depth: usize) -> Result<(), MirelError> {
    if depth >= MAX_PREDICATE_DEPTH {
        return Err(MirelError::InvalidPredicate(format!(
            "predicate nesting exceeds maximum depth {MAX_PREDICATE_DEPTH}"
        )));
    }
    for (field, cmps) in &predicate.fields {
        for cmp in cmps {
            validate_operand(field, cmp.op, &cmp.operand)?;
        }
    }
    for (_, nested) in &predicate.relations {
        validate_tree(nested, depth.saturating_add(1))?;
    }
    Ok(())
}

// =============================================================================
// MATCHING
// =============================================================================

fn link_matches(store: &LinkStore, link: &Link, predicate: &Predicate) -> bool {
    predicate
        .fields
        .iter()
        .all(|(field, cmps)| cmps.iter().all(|cmp| field_matches(link, field, cmp)))
        && predicate
            .relations
            .iter()
            .all(|(relation, nested)| relation_matches(store, link, *relation, nested))
}

fn relation_matches(store: &LinkStore, link: &Link, relation: Relation, nested: &Predicate) -> bool {
    match relation {
        Relation::Type => resolved(store, link.type_id)
            .is_some_and(|target| link_matches(store, target, nested)),
        Relation::From => resolved(store, link.from_id)
            .is_some_and(|target| link_matches(store, target, nested)),
        Relation::To => resolved(store, link.to_id)
            .is_some_and(|target| link_matches(store, target, nested)),
        Relation::Typed => store
            .typed(link.id)
            .any(|member| link_matches(store, member, nested)),
        Relation::In => store
            .in_of(link.id)
            .any(|member| link_matches(store, member, nested)),
        Relation::Out => store
            .out_of(link.id)
            .any(|member| link_matches(store, member, nested)),
    }
}

fn resolved(store: &LinkStore, reference: Option<LinkId>) -> Option<&Link> {
    store.get(reference?)
}

/// The value a scalar condition sees.
enum FieldVal<'a> {
    /// A reference field holding a link id.
    Ref(u64),
    /// An attribute value.
    Json(&'a Value),
    /// Unset reference or missing attribute.
    Absent,
}

fn field_value<'a>(link: &'a Link, field: &FieldKey) -> FieldVal<'a> {
    match field {
        FieldKey::Id => FieldVal::Ref(link.id.0),
        FieldKey::TypeId => link.type_id.map_or(FieldVal::Absent, |id| FieldVal::Ref(id.0)),
        FieldKey::FromId => link.from_id.map_or(FieldVal::Absent, |id| FieldVal::Ref(id.0)),
        FieldKey::ToId => link.to_id.map_or(FieldVal::Absent, |id| FieldVal::Ref(id.0)),
        FieldKey::Prop(key) => link.props.get(key).map_or(FieldVal::Absent, FieldVal::Json),
    }
}

fn field_matches(link: &Link, field: &FieldKey, cmp: &Cmp) -> bool {
    let value = field_value(link, field);
    match cmp.op {
        CmpOp::Eq => value_eq(&value, &cmp.operand),
        CmpOp::Neq => !value_eq(&value, &cmp.operand),
        CmpOp::Gt => value_cmp(&value, &cmp.operand) == Some(Ordering::Greater),
        CmpOp::Gte => matches!(
            value_cmp(&value, &cmp.operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CmpOp::Lt => value_cmp(&value, &cmp.operand) == Some(Ordering::Less),
        CmpOp::Lte => matches!(
            value_cmp(&value, &cmp.operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CmpOp::In => cmp
            .operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| value_eq(&value, item))),
        CmpOp::Nin => !cmp
            .operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| value_eq(&value, item))),
    }
}

fn value_eq(value: &FieldVal<'_>, operand: &Value) -> bool {
    match value {
        FieldVal::Absent => false,
        FieldVal::Ref(id) => operand.as_u64() == Some(*id),
        FieldVal::Json(json) => json_eq(json, operand),
    }
}

fn value_cmp(value: &FieldVal<'_>, operand: &Value) -> Option<Ordering> {
    match value {
        FieldVal::Absent => None,
        FieldVal::Ref(id) => operand.as_u64().map(|o| id.cmp(&o)),
        FieldVal::Json(json) => json_cmp(json, operand),
    }
}

/// Equality with numeric awareness: `1` equals `1.0`, everything else is
/// deep JSON equality.
fn json_eq(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        number_cmp(x, y) == Some(Ordering::Equal)
    } else {
        a == b
    }
}

/// Ordering across same-kind scalars. Mixed kinds and composites have no
/// ordering, which fails the condition without failing the query.
fn json_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Cross-representation numeric ordering (i64 / u64 / f64).
fn number_cmp(x: &serde_json::Number, y: &serde_json::Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

// =============================================================================
// TESTS
// =============================================================================
