//! # Query Grammar
//!
//! Structured predicate types for querying the mirror.
//!
//! A predicate is a conjunction of scalar conditions and nested relation
//! conditions, mirroring the JSON filter objects the upstream dataset uses:
//!
//! ```json
//! { "type_id": 3, "to": { "type_id": { "_in": [2, 4] } } }
//! ```
//!
//! - Deterministic parsing, fail fast: malformed input and unset (`null`)
//!   operands are `InvalidPredicate` errors, never silently skipped
//! - Scalar values are literals (equality shorthand) or operator objects
//!   with `_eq`, `_neq`, `_gt`, `_gte`, `_lt`, `_lte`, `_in`, `_nin`
//! - Relation keys `type`, `from`, `to` (singular) and `typed`, `in`, `out`
//!   (set-valued) carry nested predicates

use crate::primitives::MAX_PREDICATE_DEPTH;
use crate::MirelError;
use serde_json::Value;

// =============================================================================
// OPERATORS
// =============================================================================

/// Comparison operators of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CmpOp {
    /// `_eq` — equal.
    Eq,
    /// `_neq` — not equal. Satisfied by an unset field.
    Neq,
    /// `_gt` — greater than.
    Gt,
    /// `_gte` — greater than or equal.
    Gte,
    /// `_lt` — less than.
    Lt,
    /// `_lte` — less than or equal.
    Lte,
    /// `_in` — member of the operand array.
    In,
    /// `_nin` — not a member. Satisfied by an unset field.
    Nin,
}

impl CmpOp {
    /// Parse an operator key (`"_eq"`, `"_gt"`, ...).
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "_eq" => Some(CmpOp::Eq),
            "_neq" => Some(CmpOp::Neq),
            "_gt" => Some(CmpOp::Gt),
            "_gte" => Some(CmpOp::Gte),
            "_lt" => Some(CmpOp::Lt),
            "_lte" => Some(CmpOp::Lte),
            "_in" => Some(CmpOp::In),
            "_nin" => Some(CmpOp::Nin),
            _ => None,
        }
    }

    /// The operator's wire key.
    #[must_use]
    pub fn as_key(self) -> &'static str {
        match self {
            CmpOp::Eq => "_eq",
            CmpOp::Neq => "_neq",
            CmpOp::Gt => "_gt",
            CmpOp::Gte => "_gte",
            CmpOp::Lt => "_lt",
            CmpOp::Lte => "_lte",
            CmpOp::In => "_in",
            CmpOp::Nin => "_nin",
        }
    }
}

/// One comparison: an operator and its operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Cmp {
    /// The operator.
    pub op: CmpOp,
    /// The operand. `Value::Null` is rejected at parse and eval time.
    pub operand: Value,
}

impl Cmp {
    /// `_eq` comparison.
    #[must_use]
    pub fn eq(operand: impl Into<Value>) -> Self {
        Self { op: CmpOp::Eq, operand: operand.into() }
    }

    /// `_neq` comparison.
    #[must_use]
    pub fn neq(operand: impl Into<Value>) -> Self {
        Self { op: CmpOp::Neq, operand: operand.into() }
    }

    /// `_gt` comparison.
    #[must_use]
    pub fn gt(operand: impl Into<Value>) -> Self {
        Self { op: CmpOp::Gt, operand: operand.into() }
    }

    /// `_gte` comparison.
    #[must_use]
    pub fn gte(operand: impl Into<Value>) -> Self {
        Self { op: CmpOp::Gte, operand: operand.into() }
    }

    /// `_lt` comparison.
    #[must_use]
    pub fn lt(operand: impl Into<Value>) -> Self {
        Self { op: CmpOp::Lt, operand: operand.into() }
    }

    /// `_lte` comparison.
    #[must_use]
    pub fn lte(operand: impl Into<Value>) -> Self {
        Self { op: CmpOp::Lte, operand: operand.into() }
    }

    /// `_in` comparison over the given values.
    #[must_use]
    pub fn is_in<T: Into<Value>>(values: Vec<T>) -> Self {
        Self {
            op: CmpOp::In,
            operand: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    /// `_nin` comparison over the given values.
    #[must_use]
    pub fn not_in<T: Into<Value>>(values: Vec<T>) -> Self {
        Self {
            op: CmpOp::Nin,
            operand: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }
}

// =============================================================================
// FIELDS & RELATIONS
// =============================================================================

/// A scalar field a condition can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// The link id.
    Id,
    /// The type reference scalar.
    TypeId,
    /// The source endpoint scalar.
    FromId,
    /// The target endpoint scalar.
    ToId,
    /// An opaque attribute key.
    Prop(String),
}

impl FieldKey {
    /// Map a wire key to a field. Unknown keys are attribute lookups.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "id" => FieldKey::Id,
            "type_id" => FieldKey::TypeId,
            "from_id" => FieldKey::FromId,
            "to_id" => FieldKey::ToId,
            other => FieldKey::Prop(other.to_string()),
        }
    }

    /// The field's wire key.
    #[must_use]
    pub fn as_key(&self) -> &str {
        match self {
            FieldKey::Id => "id",
            FieldKey::TypeId => "type_id",
            FieldKey::FromId => "from_id",
            FieldKey::ToId => "to_id",
            FieldKey::Prop(key) => key,
        }
    }

    /// Whether this field holds a link id (and so compares numerically).
    #[must_use]
    pub fn is_reference(&self) -> bool {
        !matches!(self, FieldKey::Prop(_))
    }
}

/// A relation a nested predicate can recurse through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The resolved type link (singular).
    Type,
    /// The resolved source endpoint (singular).
    From,
    /// The resolved target endpoint (singular).
    To,
    /// Links typed by the candidate (set).
    Typed,
    /// Links arriving at the candidate (set).
    In,
    /// Links leaving the candidate (set).
    Out,
}

impl Relation {
    /// Parse a relation key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "type" => Some(Relation::Type),
            "from" => Some(Relation::From),
            "to" => Some(Relation::To),
            "typed" => Some(Relation::Typed),
            "in" => Some(Relation::In),
            "out" => Some(Relation::Out),
            _ => None,
        }
    }

    /// The relation's wire key.
    #[must_use]
    pub fn as_key(self) -> &'static str {
        match self {
            Relation::Type => "type",
            Relation::From => "from",
            Relation::To => "to",
            Relation::Typed => "typed",
            Relation::In => "in",
            Relation::Out => "out",
        }
    }

    /// Singular relations resolve one target; set relations test members.
    #[must_use]
    pub fn is_singular(self) -> bool {
        matches!(self, Relation::Type | Relation::From | Relation::To)
    }
}

// =============================================================================
// PREDICATE TREE
// =============================================================================

/// A predicate tree. Everything conjoins: a link matches when every scalar
/// condition and every relation condition holds.
///
/// The empty predicate matches every link.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    /// Scalar conditions: field -> comparisons (all must hold).
    pub(crate) fields: Vec<(FieldKey, Vec<Cmp>)>,
    /// Relation conditions: relation -> nested predicate.
    pub(crate) relations: Vec<(Relation, Predicate)>,
}

impl Predicate {
    /// Create an empty predicate (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar condition.
    #[must_use]
    pub fn field(mut self, key: FieldKey, cmp: Cmp) -> Self {
        self.fields.push((key, vec![cmp]));
        self
    }

    /// Condition on the link id.
    #[must_use]
    pub fn id(self, cmp: Cmp) -> Self {
        self.field(FieldKey::Id, cmp)
    }

    /// Condition on the type reference scalar.
    #[must_use]
    pub fn type_id(self, cmp: Cmp) -> Self {
        self.field(FieldKey::TypeId, cmp)
    }

    /// Condition on the source endpoint scalar.
    #[must_use]
    pub fn from_id(self, cmp: Cmp) -> Self {
        self.field(FieldKey::FromId, cmp)
    }

    /// Condition on the target endpoint scalar.
    #[must_use]
    pub fn to_id(self, cmp: Cmp) -> Self {
        self.field(FieldKey::ToId, cmp)
    }

    /// Condition on an attribute key.
    #[must_use]
    pub fn prop(self, key: impl Into<String>, cmp: Cmp) -> Self {
        self.field(FieldKey::Prop(key.into()), cmp)
    }

    /// Add a relation condition.
    #[must_use]
    pub fn relation(mut self, relation: Relation, nested: Predicate) -> Self {
        self.relations.push((relation, nested));
        self
    }

    /// The resolved type must exist and match.
    #[must_use]
    pub fn type_matches(self, nested: Predicate) -> Self {
        self.relation(Relation::Type, nested)
    }

    /// The resolved source endpoint must exist and match.
    #[must_use]
    pub fn from_matches(self, nested: Predicate) -> Self {
        self.relation(Relation::From, nested)
    }

    /// The resolved target endpoint must exist and match.
    #[must_use]
    pub fn to_matches(self, nested: Predicate) -> Self {
        self.relation(Relation::To, nested)
    }

    /// At least one link typed by the candidate must match.
    #[must_use]
    pub fn typed_matches(self, nested: Predicate) -> Self {
        self.relation(Relation::Typed, nested)
    }

    /// At least one link arriving at the candidate must match.
    #[must_use]
    pub fn in_matches(self, nested: Predicate) -> Self {
        self.relation(Relation::In, nested)
    }

    /// At least one link leaving the candidate must match.
    #[must_use]
    pub fn out_matches(self, nested: Predicate) -> Self {
        self.relation(Relation::Out, nested)
    }

    // =========================================================================
    // PARSING
    // =========================================================================

    /// Parse a predicate from its JSON wire form.
    ///
    /// # Errors
    ///
    /// `MirelError::InvalidPredicate` on a non-object root, unknown
    /// operator, unset (`null`) operand, non-array `_in`/`_nin` operand,
    /// non-numeric operand on a reference field, malformed relation value,
    /// or nesting beyond `MAX_PREDICATE_DEPTH`.
    pub fn parse(value: &Value) -> Result<Self, MirelError> {
        Self::parse_at(value, 0)
    }

    fn parse_at(value: &Value, depth: usize) -> Result<Self, MirelError> {
        if depth >= MAX_PREDICATE_DEPTH {
            return Err(MirelError::InvalidPredicate(format!(
                "predicate nesting exceeds maximum depth {MAX_PREDICATE_DEPTH}"
            )));
        }
        let Some(object) = value.as_object() else {
            return Err(MirelError::InvalidPredicate(format!(
                "predicate must be an object, got {}",
                kind_name(value)
            )));
        };

        let mut predicate = Predicate::new();
        for (key, raw) in object {
            if let Some(relation) = Relation::from_key(key) {
                if raw.is_null() {
                    return Err(MirelError::InvalidPredicate(format!(
                        "unset operand for relation '{key}'"
                    )));
                }
                if !raw.is_object() {
                    return Err(MirelError::InvalidPredicate(format!(
                        "relation '{}' requires a nested predicate object, got {}",
                        key,
                        kind_name(raw)
                    )));
                }
                let nested = Self::parse_at(raw, depth.saturating_add(1))?;
                predicate.relations.push((relation, nested));
            } else {
                let field = FieldKey::from_key(key);
                let cmps = parse_conditions(&field, raw)?;
                predicate.fields.push((field, cmps));
            }
        }
        Ok(predicate)
    }
}

/// Parse the value side of a scalar condition: a literal (equality
/// shorthand) or an operator object.
fn parse_conditions(field: &FieldKey, raw: &Value) -> Result<Vec<Cmp>, MirelError> {
    if raw.is_null() {
        return Err(MirelError::InvalidPredicate(format!(
            "unset operand for field '{}'",
            field.as_key()
        )));
    }

    let Some(object) = raw.as_object() else {
        // Literal shorthand.
        validate_operand(field, CmpOp::Eq, raw)?;
        return Ok(vec![Cmp { op: CmpOp::Eq, operand: raw.clone() }]);
    };

    if object.is_empty() {
        return Err(MirelError::InvalidPredicate(format!(
            "empty operator object for field '{}'",
            field.as_key()
        )));
    }

    let mut cmps = Vec::with_capacity(object.len());
    for (op_key, operand) in object {
        if !op_key.starts_with('_') {
            return Err(MirelError::InvalidPredicate(format!(
                "nested object on non-relation field '{}' (key '{}')",
                field.as_key(),
                op_key
            )));
        }
        let Some(op) = CmpOp::from_key(op_key) else {
            return Err(MirelError::InvalidPredicate(format!(
                "unknown operator '{}' on field '{}'",
                op_key,
                field.as_key()
            )));
        };
        validate_operand(field, op, operand)?;
        cmps.push(Cmp { op, operand: operand.clone() });
    }
    Ok(cmps)
}

/// Shared operand validation, also run by the engine against hand-built
/// trees so both entry points fail the same way.
pub(crate) fn validate_operand(field: &FieldKey, op: CmpOp, operand: &Value) -> Result<(), MirelError> {
    if operand.is_null() {
        return Err(MirelError::InvalidPredicate(format!(
            "unset operand for field '{}'",
            field.as_key()
        )));
    }

    match op {
        CmpOp::In | CmpOp::Nin => {
            let Some(items) = operand.as_array() else {
                return Err(MirelError::InvalidPredicate(format!(
                    "operator '{}' on field '{}' requires an array operand, got {}",
                    op.as_key(),
                    field.as_key(),
                    kind_name(operand)
                )));
            };
            for item in items {
                if item.is_null() {
                    return Err(MirelError::InvalidPredicate(format!(
                        "unset operand inside '{}' array for field '{}'",
                        op.as_key(),
                        field.as_key()
                    )));
                }
                if field.is_reference() && item.as_u64().is_none() {
                    return Err(reference_operand_error(field, item));
                }
            }
        }
        _ => {
            if field.is_reference() && operand.as_u64().is_none() {
                return Err(reference_operand_error(field, operand));
            }
        }
    }
    Ok(())
}

fn reference_operand_error(field: &FieldKey, operand: &Value) -> MirelError {
    MirelError::InvalidPredicate(format!(
        "field '{}' compares link ids, operand must be an unsigned integer, got {}",
        field.as_key(),
        kind_name(operand)
    ))
}

/// JSON kind name for error messages.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// TESTS
// =============================================================================
