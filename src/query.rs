//! Query model: the typed query envelope and its per-type JSON parameters.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

/// Result limit used for searches when the query does not set one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Fire count used for new tracepoints when the query does not set one.
pub const DEFAULT_FIRE_COUNT: u32 = 1;

/// Matches one `key="value"` pair of a targeting expression.
static TARGETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s="]+)="([^"]*)""#).expect("Invalid targeting regex pattern")
});

/// Handler selector carried by each query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Deepql,
    Byid,
    Tracepoint,
    /// Any other tag, including an empty or missing one.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Time window of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            from: DateTime::UNIX_EPOCH,
            to: DateTime::UNIX_EPOCH,
        }
    }
}

/// One query of a request. `ref_id` keys its slot in the response map.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub ref_id: String,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default = "empty_object", alias = "json")]
    pub raw_params: Value,
    #[serde(default)]
    pub time_range: TimeRange,
}

fn empty_object() -> Value {
    json!({})
}

/// A batch of queries plus the caller headers forwarded to the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub queries: Vec<Query>,
}

/// Tracepoint operation requested by a `tracepoint` query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracepointQueryType {
    #[default]
    List,
    Create,
    Delete,
}

/// Parameters for creating a tracepoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracepointCreate {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub line_number: u32,
    #[serde(default)]
    pub fire_count: Option<u32>,
    #[serde(default)]
    pub watches: Vec<String>,
    /// Space separated `key="value"` pairs.
    #[serde(default)]
    pub targeting: Option<String>,
    #[serde(default)]
    pub log_msg: Option<String>,
}

impl TracepointCreate {
    /// JSON body for `POST /api/tracepoints`.
    pub fn request_body(&self) -> Value {
        let fire_count = self
            .fire_count
            .filter(|count| *count > 0)
            .unwrap_or(DEFAULT_FIRE_COUNT);

        let mut args = serde_json::Map::new();
        args.insert("fire_count".into(), Value::String(fire_count.to_string()));
        if let Some(log_msg) = self.log_msg.as_deref().filter(|m| !m.is_empty()) {
            args.insert("log_msg".into(), Value::String(log_msg.to_string()));
        }

        let targeting: Vec<Value> = parse_targeting(self.targeting.as_deref().unwrap_or(""))
            .into_iter()
            .map(|(key, value)| json!({"key": key, "value": {"stringValue": value}}))
            .collect();

        json!({
            "Tracepoint": {
                "path": self.path,
                "line_number": self.line_number,
                "args": args,
                "watches": self.watches,
                "targeting": targeting,
            }
        })
    }
}

/// Per-query parameters parsed from [`Query::raw_params`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    /// DeepQL text, snapshot id, or tracepoint id depending on the query type.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub tp_query_type: Option<TracepointQueryType>,
    #[serde(default)]
    pub tp_create: Option<TracepointCreate>,
}

impl QueryModel {
    pub fn parse(raw: &Value) -> serde_json::Result<Self> {
        QueryModel::deserialize(raw)
    }

    /// The search limit, with zero and unset both meaning [`DEFAULT_LIMIT`].
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
    }
}

/// Split a targeting expression such as `service.name="api" env="prod"`
/// into key/value pairs. Fragments that are not `key="value"` are skipped.
pub fn parse_targeting(targeting: &str) -> Vec<(String, String)> {
    TARGETING_RE
        .captures_iter(targeting)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}
