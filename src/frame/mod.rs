//! Tabular result frames.
//!
//! A [`Frame`] is an ordered list of typed columns plus display metadata.
//! Each domain record kind has a fixed column layout, built by the
//! `snapshot`, `tracepoint`, and `search` submodules:
//!
//! - [`snapshot_frame`] - one row describing a captured snapshot
//! - [`tracepoint_frame`] - one row per tracepoint config
//! - [`search_frame`] - one row per search hit, newest first

mod json;
mod search;
mod snapshot;
mod tracepoint;

pub use search::{parse_duration_nanos, parse_start_time, search_frame};
pub use snapshot::{snapshot_frame, snapshot_id_to_hex};
pub use tracepoint::tracepoint_frame;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decode::DomainRecord;

/// Placeholder substituted with a cell's raw value when a link is followed.
pub const RAW_VALUE: &str = "${__value.raw}";

/// How the consuming panel should render a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visualization {
    Table,
    Plugin,
}

/// Frame-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    pub preferred_visualization: Visualization,
    /// Panel plugin expected to render the frame when `Visualization::Plugin`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

impl FrameMeta {
    pub fn table() -> Self {
        Self {
            preferred_visualization: Visualization::Table,
            plugin_hint: None,
            custom: None,
        }
    }

    pub fn plugin(hint: &str) -> Self {
        Self {
            preferred_visualization: Visualization::Plugin,
            plugin_hint: Some(hint.to_string()),
            custom: None,
        }
    }
}

/// A link from a cell to another query of this data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationLink {
    pub title: String,
    pub target_query_type: String,
    pub target_query_template: String,
}

impl NavigationLink {
    pub fn new(title: &str, target_query_type: &str, target_query_template: &str) -> Self {
        Self {
            title: title.to_string(),
            target_query_type: target_query_type.to_string(),
            target_query_template: target_query_template.to_string(),
        }
    }
}

/// Column display configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<NavigationLink>,
}

/// A typed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "camelCase")]
pub enum FieldValues {
    String(Vec<String>),
    NullableString(Vec<Option<String>>),
    Uint32(Vec<u32>),
    Uint64(Vec<u64>),
    Time(Vec<DateTime<Utc>>),
    /// Pre-serialized JSON documents.
    Json(Vec<serde_json::Value>),
}

/// A single cell, used when appending rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    NullableString(Option<String>),
    Uint32(u32),
    Uint64(u64),
    Time(DateTime<Utc>),
    Json(serde_json::Value),
}

impl FieldValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            FieldValues::String(v) => v.len(),
            FieldValues::NullableString(v) => v.len(),
            FieldValues::Uint32(v) => v.len(),
            FieldValues::Uint64(v) => v.len(),
            FieldValues::Time(v) => v.len(),
            FieldValues::Json(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, value: Scalar) -> std::result::Result<(), Scalar> {
        match (self, value) {
            (FieldValues::String(v), Scalar::String(s)) => v.push(s),
            (FieldValues::NullableString(v), Scalar::NullableString(s)) => v.push(s),
            (FieldValues::Uint32(v), Scalar::Uint32(n)) => v.push(n),
            (FieldValues::Uint64(v), Scalar::Uint64(n)) => v.push(n),
            (FieldValues::Time(v), Scalar::Time(t)) => v.push(t),
            (FieldValues::Json(v), Scalar::Json(j)) => v.push(j),
            (_, value) => return Err(value),
        }
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        match self {
            FieldValues::String(v) => v.truncate(len),
            FieldValues::NullableString(v) => v.truncate(len),
            FieldValues::Uint32(v) => v.truncate(len),
            FieldValues::Uint64(v) => v.truncate(len),
            FieldValues::Time(v) => v.truncate(len),
            FieldValues::Json(v) => v.truncate(len),
        }
    }

    /// Reorder rows so row `i` becomes `order[i]`.
    fn reorder(&mut self, order: &[usize]) {
        fn pick<T: Clone>(v: &mut Vec<T>, order: &[usize]) {
            *v = order.iter().map(|&i| v[i].clone()).collect();
        }
        match self {
            FieldValues::String(v) => pick(v, order),
            FieldValues::NullableString(v) => pick(v, order),
            FieldValues::Uint32(v) => pick(v, order),
            FieldValues::Uint64(v) => pick(v, order),
            FieldValues::Time(v) => pick(v, order),
            FieldValues::Json(v) => pick(v, order),
        }
    }
}

/// A named column with its display configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub values: FieldValues,
    pub config: FieldConfig,
}

impl Field {
    pub fn new(name: &str, values: FieldValues) -> Self {
        Self {
            name: name.to_string(),
            values,
            config: FieldConfig::default(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.config.label = Some(label.to_string());
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.config.unit = Some(unit.to_string());
        self
    }

    pub fn with_link(mut self, link: NavigationLink) -> Self {
        self.config.links.push(link);
        self
    }
}

/// A table of equal-length typed columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub fields: Vec<Field>,
    pub meta: FrameMeta,
}

impl Frame {
    /// Create a frame from empty columns.
    pub fn new(name: &str, fields: Vec<Field>, meta: FrameMeta) -> Self {
        Self {
            name: name.to_string(),
            ref_id: None,
            fields,
            meta,
        }
    }

    pub fn with_ref_id(mut self, ref_id: &str) -> Self {
        self.ref_id = Some(ref_id.to_string());
        self
    }

    /// Append one row. The row must have one cell per field, each matching
    /// the field's type; otherwise the frame is left unchanged.
    pub fn append_row(&mut self, row: Vec<Scalar>) -> Result<()> {
        if row.len() != self.fields.len() {
            bail!(
                "Row has {} values but frame {} has {} fields",
                row.len(),
                self.name,
                self.fields.len()
            );
        }
        let rows = self.row_count();
        let mut mismatch = None;
        for (field, value) in self.fields.iter_mut().zip(row) {
            if let Err(value) = field.values.push(value) {
                mismatch = Some((field.name.clone(), value));
                break;
            }
        }

        if let Some((name, value)) = mismatch {
            for field in &mut self.fields {
                field.values.truncate(rows);
            }
            bail!("Value {:?} does not match type of field {}", value, name);
        }
        Ok(())
    }

    /// Number of rows. All fields have the same length.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.fields.first().map_or(0, |f| f.values.len())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reorder all rows by `order`, a permutation of `0..row_count()`.
    fn reorder_rows(&mut self, order: &[usize]) {
        for field in &mut self.fields {
            field.values.reorder(order);
        }
    }
}

/// Build the frames for a decoded record.
pub fn frames_for(record: &DomainRecord) -> Result<Vec<Frame>> {
    match record {
        DomainRecord::Snapshot(snapshot) => Ok(vec![snapshot_frame(snapshot)?]),
        DomainRecord::Tracepoints { configs, origin } => {
            Ok(vec![tracepoint_frame(configs, *origin)?])
        }
        DomainRecord::Search {
            snapshots,
            tracepoints,
        } => {
            let mut frames = vec![search_frame(snapshots)?];
            if let Some(configs) = tracepoints {
                frames.push(tracepoint_frame(
                    configs,
                    crate::decode::TracepointOrigin::Listed,
                )?);
            }
            Ok(frames)
        }
        DomainRecord::Empty => Ok(Vec::new()),
    }
}
