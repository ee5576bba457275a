//! Serde types for every request and response body the server speaks.
//!
//! The change feed lands here as `EventRequest` objects; the `set` object
//! of an update distinguishes `null` (clear the field / remove the key)
//! from an absent key (leave it alone), which is why it travels as a raw
//! JSON map and is converted to a `LinkPatch` by hand.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mirel_core::{
    Link, LinkEvent, LinkId, LinkPatch, LinkStore, MirelError, MirrorMetrics, PropMap, RefPatch,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH
// =============================================================================

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS COUNTERS
// =============================================================================

/// Mirror status response: the metrics counters plus the derived ratio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub link_count: usize,
    pub reference_count: usize,
    pub resolved_references: usize,
    pub dangling_references: usize,
    pub type_count: usize,
    pub resolved_permille: u64,
}

impl StatusResponse {
    #[must_use]
    pub fn from_metrics(metrics: &MirrorMetrics) -> Self {
        Self {
            link_count: metrics.link_count,
            reference_count: metrics.reference_count,
            resolved_references: metrics.resolved_references,
            dangling_references: metrics.dangling_references,
            type_count: metrics.type_count,
            resolved_permille: metrics.resolved_permille(),
        }
    }
}

// =============================================================================
// LINK REPRESENTATION
// =============================================================================

/// JSON representation of a link record.
///
/// Unset references are omitted from the serialized form, as is an empty
/// attribute bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkJson {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<u64>,
    #[serde(default, skip_serializing_if = "PropMap::is_empty")]
    pub props: PropMap,
}

impl From<&Link> for LinkJson {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id.0,
            type_id: link.type_id.map(|t| t.0),
            from_id: link.from_id.map(|f| f.0),
            to_id: link.to_id.map(|t| t.0),
            props: link.props.clone(),
        }
    }
}

impl LinkJson {
    /// Convert into the core record type.
    #[must_use]
    pub fn into_link(self) -> Link {
        Link {
            id: LinkId(self.id),
            type_id: self.type_id.map(LinkId),
            from_id: self.from_id.map(LinkId),
            to_id: self.to_id.map(LinkId),
            props: self.props,
        }
    }
}

// =============================================================================
// LINK LISTING
// =============================================================================

/// Query parameters for `GET /links`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinksParams {
    pub limit: Option<usize>,
}

/// Response for `GET /links`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksResponse {
    /// Total links in the mirror.
    pub total: usize,
    /// Links carried in this response (after `limit`).
    pub count: usize,
    pub links: Vec<LinkJson>,
}

/// Response for `GET /links/{id}`: the record plus its derived views.
///
/// `type_link`/`from_link`/`to_link` are the resolved reference targets; a
/// reference that is set but dangling resolves to nothing and is omitted.
/// `typed`/`out`/`in` carry adjacency member ids in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDetailResponse {
    pub link: LinkJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_link: Option<LinkJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_link: Option<LinkJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_link: Option<LinkJson>,
    pub typed: Vec<u64>,
    #[serde(rename = "out")]
    pub outgoing: Vec<u64>,
    #[serde(rename = "in")]
    pub incoming: Vec<u64>,
}

impl LinkDetailResponse {
    /// Build the detail view for a stored link; `None` when the id is absent.
    #[must_use]
    pub fn from_store(store: &LinkStore, id: LinkId) -> Option<Self> {
        let link = store.get(id)?;
        Some(Self {
            link: link.into(),
            type_link: store.type_of(id).map(Into::into),
            from_link: store.from_of(id).map(Into::into),
            to_link: store.to_of(id).map(Into::into),
            typed: store.typed(id).map(|member| member.id.0).collect(),
            outgoing: store.out_of(id).map(|member| member.id.0).collect(),
            incoming: store.in_of(id).map(|member| member.id.0).collect(),
        })
    }
}

// =============================================================================
// EVENT REQUEST/RESPONSE
// =============================================================================

/// One change feed event, tagged by operation.
///
/// ```json
/// {"op": "insert", "link": {"id": 7, "type_id": 3}}
/// {"op": "update", "id": 7, "set": {"from_id": null, "name": "alpha"}}
/// {"op": "delete", "id": 7}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EventRequest {
    Insert { link: LinkJson },
    Update { id: u64, set: PropMap },
    Delete { id: u64 },
}

impl EventRequest {
    /// Convert to a core event, validating the update `set` object.
    ///
    /// In `set`, the reserved keys `type_id`/`from_id`/`to_id` take an
    /// unsigned integer (set the reference) or `null` (clear it); any
    /// other key is an attribute operation where `null` removes the key.
    /// `id` is not patchable.
    pub fn to_event(&self) -> Result<LinkEvent, MirelError> {
        match self {
            Self::Insert { link } => Ok(LinkEvent::Insert(link.clone().into_link())),
            Self::Update { id, set } => Ok(LinkEvent::Update(LinkId(*id), parse_patch(set)?)),
            Self::Delete { id } => Ok(LinkEvent::Delete(LinkId(*id))),
        }
    }
}

fn parse_patch(set: &PropMap) -> Result<LinkPatch, MirelError> {
    let mut patch = LinkPatch::new();
    for (key, value) in set {
        match key.as_str() {
            "id" => {
                return Err(MirelError::InvalidLink(
                    "a patch may not change id".to_string(),
                ));
            }
            "type_id" => patch.type_id = parse_ref_patch(key, value)?,
            "from_id" => patch.from_id = parse_ref_patch(key, value)?,
            "to_id" => patch.to_id = parse_ref_patch(key, value)?,
            _ => {
                patch = match value {
                    serde_json::Value::Null => patch.remove_prop(key.clone()),
                    other => patch.set_prop(key.clone(), other.clone()),
                };
            }
        }
    }
    Ok(patch)
}

fn parse_ref_patch(key: &str, value: &serde_json::Value) -> Result<RefPatch, MirelError> {
    if value.is_null() {
        return Ok(RefPatch::Clear);
    }
    value
        .as_u64()
        .map(|id| RefPatch::Set(LinkId(id)))
        .ok_or_else(|| {
            MirelError::InvalidLink(format!("{key} must be an unsigned integer or null"))
        })
}

/// Response for `POST /events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub success: bool,
    /// Events applied before the first failure (all of them on success).
    pub applied: usize,
    pub error: Option<String>,
}

impl EventsResponse {
    #[must_use]
    pub fn applied(count: usize) -> Self {
        Self {
            success: true,
            applied: count,
            error: None,
        }
    }

    pub fn failed(applied: usize, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            applied,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// Query request: a predicate object plus an optional result cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub predicate: serde_json::Value,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Body of `POST /query`: the matched links or the failure reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub count: usize,
    pub links: Vec<LinkJson>,
    pub error: Option<String>,
}

impl QueryResponse {
    #[must_use]
    pub fn with_links(links: Vec<LinkJson>) -> Self {
        Self {
            success: true,
            count: links.len(),
            links,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            links: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT
// =============================================================================

/// Body of `POST /export`; `data` carries the snapshot bytes in base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>,
    pub checksum: Option<u64>,
    pub link_count: Option<usize>,
    pub error: Option<String>,
}

impl ExportResponse {
    #[must_use]
    pub fn success(data: Vec<u8>, checksum: u64, link_count: usize) -> Self {
        Self {
            success: true,
            data: Some(STANDARD.encode(&data)),
            checksum: Some(checksum),
            link_count: Some(link_count),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            link_count: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// ERROR BODY
// =============================================================================

/// Error body for endpoints without a dedicated response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}
