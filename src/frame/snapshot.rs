use anyhow::Result;
use serde_json::Value;

use super::json::{frames_json, tracepoint_json, var_lookup_json, watches_json};
use super::{Field, FieldValues, Frame, FrameMeta, Scalar};
use crate::flatten::flatten_attributes;
use crate::proto::Snapshot;

const SNAPSHOT_PANEL: &str = "deep-snapshot-panel";

/// Render a snapshot id as lowercase hex without leading zeros.
/// An all-zero or empty id renders as `""`.
pub fn snapshot_id_to_hex(id: &[u8]) -> String {
    hex::encode(id).trim_start_matches('0').to_string()
}

/// Single-row frame describing one captured snapshot.
pub fn snapshot_frame(snapshot: &Snapshot) -> Result<Frame> {
    let mut frame = Frame::new(
        "Snapshot",
        vec![
            Field::new("snapshotID", FieldValues::String(Vec::new())).with_label("Snapshot ID"),
            Field::new("tracepoint", FieldValues::Json(Vec::new())),
            Field::new("varLookup", FieldValues::Json(Vec::new())),
            Field::new("tsNanos", FieldValues::Uint64(Vec::new())),
            Field::new("frames", FieldValues::Json(Vec::new())),
            Field::new("watches", FieldValues::Json(Vec::new())),
            Field::new("attributes", FieldValues::Json(Vec::new())),
            Field::new("durationNanos", FieldValues::Uint64(Vec::new())).with_unit("ns"),
            Field::new("resource", FieldValues::Json(Vec::new())),
            Field::new("logMsg", FieldValues::NullableString(Vec::new())),
        ],
        FrameMeta::plugin(SNAPSHOT_PANEL),
    );

    let tracepoint = snapshot
        .tracepoint
        .as_ref()
        .map_or(Value::Null, tracepoint_json);

    frame.append_row(vec![
        Scalar::String(snapshot_id_to_hex(&snapshot.id)),
        Scalar::Json(tracepoint),
        Scalar::Json(var_lookup_json(&snapshot.var_lookup)),
        Scalar::Uint64(snapshot.ts_nanos),
        Scalar::Json(frames_json(&snapshot.frames)),
        Scalar::Json(watches_json(&snapshot.watches)),
        Scalar::Json(Value::Object(flatten_attributes(&snapshot.attributes))),
        Scalar::Uint64(snapshot.duration_nanos),
        Scalar::Json(Value::Object(flatten_attributes(&snapshot.resource))),
        Scalar::NullableString(snapshot.log_msg.clone()),
    ])?;

    Ok(frame)
}
