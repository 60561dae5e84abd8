pub mod error;
pub mod law_link;
pub mod render;
pub mod rules;
pub mod settings;
pub mod status;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

pub use error::SettingsError;
pub use law_link::LawLink;
pub use settings::Settings;
pub use status::RiskStatus;

// --- Graph (entity extraction output) ---

/// A person, organization or asset extracted from a scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Node {
    /// Graph-unique identifier, e.g. "p1" or "o2"
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub id: String,
    /// Entity category such as Person, Organization, Asset
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub label: Option<String>,
    /// Free-form attributes: name, type, firm_role, position, is_client, value, ...
    #[serde(default, deserialize_with = "lenient_object")]
    pub properties: BTreeMap<String, Value>,
    /// Any other fields the model attached, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Node {
    /// Textual value of a property. Empty strings and non-scalar values count as absent.
    pub fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.properties.get(key)? {
            Value::String(s) if !s.is_empty() => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }

    /// Name shown on diagrams: `name`, else `type`, else the id.
    pub fn display_name(&self) -> Cow<'_, str> {
        self.property("name")
            .or_else(|| self.property("type"))
            .unwrap_or(Cow::Borrowed(self.id.as_str()))
    }

    /// Role inside the audit firm or the client (`firm_role`, else `position`).
    pub fn role(&self) -> Option<Cow<'_, str>> {
        self.property("firm_role")
            .or_else(|| self.property("position"))
    }
}

/// A typed, directed relationship such as `EMPLOYED_BY` or `FAMILY_OF`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Edge {
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub source_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub target_id: String,
    /// Relationship token with underscores as word separators
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub kind: Option<String>,
    /// Attributes beyond the endpoints and type, e.g. `properties`, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Marker substituted for model output that could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct UpstreamError {
    pub error: String,
    #[serde(default)]
    pub details: String,
}

impl UpstreamError {
    pub const JSON_PARSE_ERROR: &'static str = "JSON_PARSE_ERROR";

    pub fn parse(details: impl Into<String>) -> Self {
        Self {
            error: Self::JSON_PARSE_ERROR.to_string(),
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Graph {
    #[serde(default, deserialize_with = "lenient_items")]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub relationships: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UpstreamError>,
}

impl Graph {
    /// Empty graph carrying the parse failure, so later stages can still run.
    pub fn failed(error: UpstreamError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// --- Opinion (expert analysis output) ---

/// Raw opinion as returned by the analysis model, before status normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Opinion {
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub safeguards: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub relevant_laws: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub risky_node_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient_index_list")]
    pub risky_edge_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UpstreamError>,
}

impl Opinion {
    pub fn failed(error: UpstreamError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn annotation(&self) -> RiskAnnotation {
        RiskAnnotation::new(
            self.risky_node_ids.iter().cloned(),
            self.risky_edge_indices.iter().copied(),
        )
    }
}

/// Graph elements flagged as independence threats. Read-only input to rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskAnnotation {
    pub node_ids: BTreeSet<String>,
    pub edge_indices: BTreeSet<usize>,
}

impl RiskAnnotation {
    pub fn new(
        node_ids: impl IntoIterator<Item = String>,
        edge_indices: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            node_ids: node_ids.into_iter().collect(),
            edge_indices: edge_indices.into_iter().collect(),
        }
    }

    pub fn is_risky_node(&self, id: &str) -> bool {
        self.node_ids.contains(id)
    }

    pub fn is_risky_edge(&self, index: usize) -> bool {
        self.edge_indices.contains(&index)
    }
}

// --- Report ---

/// Unified result of one scenario analysis, as served by the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub status: RiskStatus,
    pub status_color: String,
    pub reason_html: String,
    #[serde(default)]
    pub safeguards: Vec<String>,
    #[serde(default)]
    pub relevant_laws: Vec<String>,
    #[serde(default)]
    pub law_links: Vec<LawLink>,
    pub graph: Graph,
    pub law_context: String,
    #[serde(default)]
    pub risky_node_ids: Vec<String>,
    #[serde(default)]
    pub risky_edge_indices: Vec<usize>,
    pub graph_image_url: String,
}

impl AnalysisReport {
    /// Normalize the opinion's status, render the risk map and resolve law links.
    pub fn assemble(graph: Graph, law_context: String, opinion: Opinion) -> Self {
        let status = RiskStatus::normalize(&opinion.status);
        let graph_image_url = render::graph_image_url(&graph, &opinion.annotation());
        let law_links = law_link::law_links(&opinion.relevant_laws);

        Self {
            status,
            status_color: status.color().to_string(),
            reason_html: opinion.reason,
            safeguards: opinion.safeguards,
            relevant_laws: opinion.relevant_laws,
            law_links,
            graph,
            law_context,
            risky_node_ids: opinion.risky_node_ids,
            risky_edge_indices: opinion.risky_edge_indices,
            graph_image_url,
        }
    }
}

// --- Lenient field decoding ---
//
// Model output is loosely typed: ids arrive as numbers, indices as strings.
// These decoders coerce scalars and drop anything else instead of failing.

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value).filter(|s| !s.is_empty()))
}

fn lenient_object<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, Value>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    })
}

/// Decodes each entry on its own; entries of the wrong shape are dropped with
/// a warning instead of failing the whole list. A non-list is still an error.
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(de::Error::invalid_type(
                de::Unexpected::Other(json_kind(&other)),
                &"a list",
            ))
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed graph entry");
                None
            }
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lenient_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(&other).into_iter().collect(),
    })
}

fn lenient_index_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<usize>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(scalar_index).collect(),
        _ => Vec::new(),
    })
}
