//! JSON renderings of the protobuf records shown in frame cells.
//!
//! Keys use the proto field names. Proto3 `optional` fields are only
//! emitted when set; attribute lists are flattened to key -> scalar maps.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::flatten::flatten_attributes;
use crate::proto::{
    watch_result, StackFrame, TracePointConfig, Variable, VariableID, WatchResult, WatchSource,
};

fn put_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v.into());
    }
}

fn string_map(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

pub(super) fn args_json(args: &HashMap<String, String>) -> Value {
    string_map(args)
}

pub(super) fn tracepoint_json(tp: &TracePointConfig) -> Value {
    json!({
        "id": tp.id,
        "path": tp.path,
        "line_number": tp.line_number,
        "args": string_map(&tp.args),
        "watches": tp.watches,
        "targeting": flatten_attributes(&tp.targeting),
    })
}

pub(super) fn variable_id_json(var: &VariableID) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), Value::String(var.id.clone()));
    map.insert("name".into(), Value::String(var.name.clone()));
    map.insert("modifiers".into(), json!(var.modifiers));
    put_opt(&mut map, "original_name", var.original_name.clone());
    Value::Object(map)
}

fn variable_json(var: &Variable) -> Value {
    json!({
        "type": var.var_type,
        "value": var.value,
        "hash": var.hash,
        "children": var.children.iter().map(variable_id_json).collect::<Vec<_>>(),
        "truncated": var.truncated,
    })
}

pub(super) fn var_lookup_json(lookup: &HashMap<String, Variable>) -> Value {
    Value::Object(
        lookup
            .iter()
            .map(|(id, var)| (id.clone(), variable_json(var)))
            .collect(),
    )
}

fn stack_frame_json(frame: &StackFrame) -> Value {
    let mut map = Map::new();
    map.insert("file_name".into(), Value::String(frame.file_name.clone()));
    map.insert("method_name".into(), Value::String(frame.method_name.clone()));
    map.insert("line_number".into(), json!(frame.line_number));
    put_opt(&mut map, "class_name", frame.class_name.clone());
    put_opt(&mut map, "is_async", frame.is_async);
    put_opt(&mut map, "column_number", frame.column_number);
    put_opt(&mut map, "transpiled_file_name", frame.transpiled_file_name.clone());
    put_opt(&mut map, "transpiled_line_number", frame.transpiled_line_number);
    put_opt(&mut map, "transpiled_column_number", frame.transpiled_column_number);
    map.insert(
        "variables".into(),
        Value::Array(frame.variables.iter().map(variable_id_json).collect()),
    );
    put_opt(&mut map, "app_frame", frame.app_frame);
    put_opt(&mut map, "native_frame", frame.native_frame);
    put_opt(&mut map, "short_path", frame.short_path.clone());
    Value::Object(map)
}

pub(super) fn frames_json(frames: &[StackFrame]) -> Value {
    Value::Array(frames.iter().map(stack_frame_json).collect())
}

fn watch_source_name(watch: &WatchResult) -> Value {
    match watch.source.enum_value() {
        Ok(WatchSource::WATCH) => "WATCH".into(),
        Ok(WatchSource::LOG) => "LOG".into(),
        Ok(WatchSource::METRIC) => "METRIC".into(),
        Ok(WatchSource::CAPTURE) => "CAPTURE".into(),
        Err(unknown) => json!(unknown),
    }
}

fn watch_json(watch: &WatchResult) -> Value {
    let mut map = Map::new();
    map.insert("expression".into(), Value::String(watch.expression.clone()));
    match &watch.result {
        Some(watch_result::Result::GoodResult(var)) => {
            map.insert("good_result".into(), variable_id_json(var));
        }
        Some(watch_result::Result::ErrorResult(err)) => {
            map.insert("error_result".into(), Value::String(err.clone()));
        }
        None => {}
    }
    map.insert("source".into(), watch_source_name(watch));
    Value::Object(map)
}

pub(super) fn watches_json(watches: &[WatchResult]) -> Value {
    Value::Array(watches.iter().map(watch_json).collect())
}
