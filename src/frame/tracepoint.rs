use anyhow::Result;
use serde_json::{json, Value};

use super::json::args_json;
use super::{Field, FieldValues, Frame, FrameMeta, NavigationLink, Scalar, RAW_VALUE};
use crate::decode::TracepointOrigin;
use crate::flatten::flatten_attributes;
use crate::proto::TracePointConfig;

const TRACEPOINT_PANEL: &str = "deep-tracepoint-panel";

fn origin_name(origin: TracepointOrigin) -> &'static str {
    match origin {
        TracepointOrigin::Listed => "list",
        TracepointOrigin::Created => "create",
        TracepointOrigin::Deleted => "delete",
    }
}

/// One row per tracepoint config.
///
/// The `snapshots` column links to a search for snapshots of that tracepoint.
/// Listed tracepoints also get a `delete` column linking to the delete query.
pub fn tracepoint_frame(configs: &[TracePointConfig], origin: TracepointOrigin) -> Result<Frame> {
    let with_delete = origin != TracepointOrigin::Deleted;

    let mut fields = vec![
        Field::new("id", FieldValues::String(Vec::new())),
        Field::new("path", FieldValues::String(Vec::new())),
        Field::new("line_number", FieldValues::Uint32(Vec::new())),
        Field::new("args", FieldValues::Json(Vec::new())),
        Field::new("watches", FieldValues::Json(Vec::new())),
        Field::new("targeting", FieldValues::Json(Vec::new())),
        Field::new("snapshots", FieldValues::String(Vec::new())).with_link(NavigationLink::new(
            "List snapshots",
            "deepql",
            &format!("{{ tracepoint=\"{RAW_VALUE}\" }}"),
        )),
    ];
    if with_delete {
        fields.push(
            Field::new("delete", FieldValues::String(Vec::new())).with_link(NavigationLink::new(
                "Delete tracepoint",
                "deepql",
                &format!("delete{{ id=\"{RAW_VALUE}\" }}"),
            )),
        );
    }

    let mut meta = FrameMeta::plugin(TRACEPOINT_PANEL);
    meta.custom = Some(json!({ "origin": origin_name(origin) }));
    let mut frame = Frame::new("Tracepoints", fields, meta);

    for config in configs {
        let mut row = vec![
            Scalar::String(config.id.clone()),
            Scalar::String(config.path.clone()),
            Scalar::Uint32(config.line_number),
            Scalar::Json(args_json(&config.args)),
            Scalar::Json(json!(config.watches)),
            Scalar::Json(Value::Object(flatten_attributes(&config.targeting))),
            Scalar::String(config.id.clone()),
        ];
        if with_delete {
            row.push(Scalar::String(config.id.clone()));
        }
        frame.append_row(row)?;
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, path: &str, line: u32) -> TracePointConfig {
        let mut tp = TracePointConfig::new();
        tp.id = id.to_string();
        tp.path = path.to_string();
        tp.line_number = line;
        tp.args.insert("fire_count".into(), "3".into());
        tp.watches.push("self.x".into());
        tp
    }

    #[test]
    fn test_listed_tracepoints() {
        let frame = tracepoint_frame(
            &[config("a", "app.py", 10), config("b", "lib.py", 20)],
            TracepointOrigin::Listed,
        )
        .unwrap();

        assert_eq!(frame.name, "Tracepoints");
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.meta.plugin_hint.as_deref(), Some("deep-tracepoint-panel"));
        assert_eq!(frame.meta.custom, Some(json!({"origin": "list"})));
        assert_eq!(
            frame.field("line_number").unwrap().values,
            FieldValues::Uint32(vec![10, 20])
        );
        assert_eq!(
            frame.field("args").unwrap().values,
            FieldValues::Json(vec![json!({"fire_count": "3"}), json!({"fire_count": "3"})])
        );

        let snapshots = frame.field("snapshots").unwrap();
        assert_eq!(
            snapshots.values,
            FieldValues::String(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            snapshots.config.links[0].target_query_template,
            "{ tracepoint=\"${__value.raw}\" }"
        );

        let delete = frame.field("delete").unwrap();
        assert_eq!(delete.config.links[0].target_query_type, "deepql");
        assert_eq!(
            delete.config.links[0].target_query_template,
            "delete{ id=\"${__value.raw}\" }"
        );
    }

    #[test]
    fn test_deleted_tracepoint_has_no_delete_column() {
        let frame = tracepoint_frame(&[config("a", "app.py", 10)], TracepointOrigin::Deleted).unwrap();
        assert!(frame.field("delete").is_none());
        assert_eq!(frame.fields.len(), 7);
        assert_eq!(frame.meta.custom, Some(json!({"origin": "delete"})));
    }

    #[test]
    fn test_empty_list() {
        let frame = tracepoint_frame(&[], TracepointOrigin::Listed).unwrap();
        assert_eq!(frame.row_count(), 0);
        assert_eq!(frame.fields.len(), 8);
    }
}
