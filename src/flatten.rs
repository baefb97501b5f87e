//! Flattening of `AnyValue` attribute values into JSON scalars.
//!
//! Attribute maps are rendered as one JSON object per cell, so every value
//! has to become a scalar. Composite values (arrays and key/value lists) are
//! flattened recursively and then serialized to a JSON string.

use serde_json::{Map, Value};

use crate::proto::{any_value, AnyValue, KeyValue};

/// Placeholder emitted for byte values, which have no useful table form.
pub const UNSUPPORTED_BYTES: &str = "Unsupported type: bytes";

/// Deepest nesting of arrays/kvlists that is flattened.
///
/// Each level re-escapes the serialized level below it, so output size
/// grows exponentially with depth.
pub const MAX_FLATTEN_DEPTH: usize = 10;

/// Placeholder emitted in place of a value nested deeper than [`MAX_FLATTEN_DEPTH`].
pub const UNSUPPORTED_DEPTH: &str = "Unsupported depth: nesting exceeds 10 levels";

/// Flatten a single value into a JSON scalar.
pub fn flatten(value: &AnyValue) -> Value {
    flatten_at(value, 0)
}

/// Flatten a list of attributes into a key -> scalar map. Later keys win.
pub fn flatten_attributes(attributes: &[KeyValue]) -> Map<String, Value> {
    flatten_kvs_at(attributes, 0)
}

fn flatten_at(value: &AnyValue, depth: usize) -> Value {
    if depth > MAX_FLATTEN_DEPTH {
        return Value::String(UNSUPPORTED_DEPTH.to_string());
    }

    // An unset oneof carries no value; treat it as the proto default string.
    let Some(inner) = value.value.as_ref() else {
        return Value::String(String::new());
    };

    match inner {
        any_value::Value::StringValue(s) => Value::String(s.clone()),
        any_value::Value::BoolValue(b) => Value::Bool(*b),
        any_value::Value::IntValue(n) => Value::from(*n),
        any_value::Value::DoubleValue(n) => double_to_json(*n),
        any_value::Value::BytesValue(_) => Value::String(UNSUPPORTED_BYTES.to_string()),
        any_value::Value::ArrayValue(array) => {
            let values: Vec<Value> = array
                .values
                .iter()
                .map(|v| flatten_at(v, depth + 1))
                .collect();
            Value::String(Value::Array(values).to_string())
        }
        any_value::Value::KvlistValue(kvlist) => {
            let map = flatten_kvs_at(&kvlist.values, depth + 1);
            Value::String(Value::Object(map).to_string())
        }
    }
}

fn flatten_kvs_at(kvs: &[KeyValue], depth: usize) -> Map<String, Value> {
    let mut map = Map::new();
    for kv in kvs {
        let value = match kv.value.as_ref() {
            Some(v) => flatten_at(v, depth),
            None => Value::String(String::new()),
        };
        map.insert(kv.key.clone(), value);
    }
    map
}

/// JSON has no NaN or infinity, so those are carried as strings.
fn double_to_json(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ArrayValue, KeyValueList};

    fn any(v: any_value::Value) -> AnyValue {
        let mut value = AnyValue::new();
        value.value = Some(v);
        value
    }

    fn kv(key: &str, v: any_value::Value) -> KeyValue {
        let mut kv = KeyValue::new();
        kv.key = key.to_string();
        kv.value = protobuf::MessageField::some(any(v));
        kv
    }

    fn nested_array(levels: usize) -> AnyValue {
        let mut value = any(any_value::Value::IntValue(1));
        for _ in 0..levels {
            let mut array = ArrayValue::new();
            array.values.push(value);
            value = any(any_value::Value::ArrayValue(array));
        }
        value
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(
            flatten(&any(any_value::Value::StringValue("hello".into()))),
            Value::String("hello".into())
        );
        assert_eq!(
            flatten(&any(any_value::Value::IntValue(-42))),
            serde_json::json!(-42)
        );
        assert_eq!(
            flatten(&any(any_value::Value::DoubleValue(1.5))),
            serde_json::json!(1.5)
        );
        assert_eq!(
            flatten(&any(any_value::Value::BoolValue(true))),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_bytes_placeholder() {
        assert_eq!(
            flatten(&any(any_value::Value::BytesValue(vec![1, 2, 3]))),
            Value::String(UNSUPPORTED_BYTES.into())
        );
        assert_eq!(
            flatten(&any(any_value::Value::BytesValue(Vec::new()))),
            Value::String(UNSUPPORTED_BYTES.into())
        );
    }

    #[test]
    fn test_non_finite_double() {
        let val = flatten(&any(any_value::Value::DoubleValue(f64::NAN)));
        assert_eq!(val, Value::String("NaN".into()));
        let val = flatten(&any(any_value::Value::DoubleValue(f64::INFINITY)));
        assert_eq!(val, Value::String("inf".into()));
    }

    #[test]
    fn test_array_serialized_as_string() {
        let mut array = ArrayValue::new();
        array.values.push(any(any_value::Value::IntValue(1)));
        array.values.push(any(any_value::Value::StringValue("two".into())));
        array.values.push(any(any_value::Value::BytesValue(vec![0])));

        let val = flatten(&any(any_value::Value::ArrayValue(array)));
        assert_eq!(
            val,
            Value::String(r#"[1,"two","Unsupported type: bytes"]"#.into())
        );
    }

    #[test]
    fn test_kvlist_last_write_wins() {
        let mut list = KeyValueList::new();
        list.values.push(kv("a", any_value::Value::IntValue(1)));
        list.values.push(kv("b", any_value::Value::BoolValue(false)));
        list.values.push(kv("a", any_value::Value::IntValue(2)));

        let val = flatten(&any(any_value::Value::KvlistValue(list)));
        let parsed: serde_json::Value = serde_json::from_str(val.as_str().unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!({"a": 2, "b": false}));
    }

    #[test]
    fn test_nested_kvlist_inside_array() {
        let mut list = KeyValueList::new();
        list.values.push(kv("k", any_value::Value::StringValue("v".into())));
        let mut array = ArrayValue::new();
        array.values.push(any(any_value::Value::KvlistValue(list)));

        let val = flatten(&any(any_value::Value::ArrayValue(array)));
        assert_eq!(val, Value::String(r#"["{\"k\":\"v\"}"]"#.into()));
    }

    #[test]
    fn test_unset_value_is_empty_string() {
        assert_eq!(flatten(&AnyValue::new()), Value::String(String::new()));
    }

    #[test]
    fn test_depth_bound() {
        // Exactly at the bound everything is flattened.
        let val = flatten(&nested_array(MAX_FLATTEN_DEPTH));
        assert!(!val.as_str().unwrap().contains(UNSUPPORTED_DEPTH));

        // One level beyond, the innermost value is replaced.
        let val = flatten(&nested_array(MAX_FLATTEN_DEPTH + 1));
        assert!(val.as_str().unwrap().contains("Unsupported depth"));
    }

    #[test]
    fn test_flatten_attributes() {
        let attrs = vec![
            kv("service.name", any_value::Value::StringValue("svc".into())),
            kv("count", any_value::Value::IntValue(3)),
            kv("service.name", any_value::Value::StringValue("other".into())),
        ];
        let map = flatten_attributes(&attrs);
        assert_eq!(map.len(), 2);
        assert_eq!(map["service.name"], Value::String("other".into()));
        assert_eq!(map["count"], serde_json::json!(3));
    }
}
