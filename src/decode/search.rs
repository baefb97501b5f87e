//! JSON payloads returned by the DeepQL search endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::DomainRecord;
use crate::error::QueryError;
use crate::proto::{any_value, AnyValue, ArrayValue, KeyValue, KeyValueList, TracePointConfig};

/// `x-deepql-type` value announcing a tracepoint envelope.
const TRACEPOINT_PAYLOAD: &str = "tracepoint";

/// Tracepoint envelope type whose `affected` list is shown.
const LIST_TYPE: &str = "list";

/// One snapshot matched by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultMetadata {
    #[serde(rename = "snapshotID", default, deserialize_with = "nullable")]
    pub snapshot_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub file_path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub line_no: i64,
    /// Unix start time in nanoseconds, as a decimal string.
    #[serde(default, deserialize_with = "decimal_string")]
    pub start_time_unix_nano: String,
    /// Duration in nanoseconds, as a decimal string.
    #[serde(default, deserialize_with = "decimal_string")]
    pub duration_nano: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchEnvelope {
    #[serde(default, deserialize_with = "nullable")]
    snapshots: Vec<SearchResultMetadata>,
    #[serde(default)]
    tracepoints: Option<TracepointEnvelope>,
}

#[derive(Debug, Default, Deserialize)]
struct TracepointEnvelope {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    kind: String,
    #[serde(default, deserialize_with = "nullable")]
    affected: Vec<TracepointJson>,
    #[serde(default, deserialize_with = "nullable")]
    all: Vec<TracepointJson>,
}

impl TracepointEnvelope {
    fn into_configs(self) -> Vec<TracePointConfig> {
        let selected = if self.kind == LIST_TYPE {
            self.affected
        } else {
            self.all
        };
        selected.into_iter().map(TracePointConfig::from).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TracepointJson {
    #[serde(default, alias = "ID", deserialize_with = "nullable")]
    id: String,
    #[serde(default, deserialize_with = "nullable")]
    path: String,
    #[serde(default, alias = "lineNumber", deserialize_with = "nullable")]
    line_number: u32,
    #[serde(default, deserialize_with = "nullable")]
    args: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    watches: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    targeting: Vec<KeyValueJson>,
}

impl From<TracepointJson> for TracePointConfig {
    fn from(json: TracepointJson) -> Self {
        let mut config = TracePointConfig::new();
        config.id = json.id;
        config.path = json.path;
        config.line_number = json.line_number;
        config.args = json.args;
        config.watches = json.watches;
        config.targeting = json.targeting.into_iter().map(KeyValue::from).collect();
        config
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeyValueJson {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: Option<AnyValueJson>,
}

impl From<KeyValueJson> for KeyValue {
    fn from(json: KeyValueJson) -> Self {
        let mut kv = KeyValue::new();
        kv.key = json.key;
        kv.value = json.value.map(AnyValue::from).into();
        kv
    }
}

/// Proto3 JSON form of `AnyValue`, also accepting proto field names.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnyValueJson {
    #[serde(default, alias = "string_value")]
    string_value: Option<String>,
    #[serde(default, alias = "bool_value")]
    bool_value: Option<bool>,
    #[serde(default, alias = "int_value", deserialize_with = "optional_i64")]
    int_value: Option<i64>,
    #[serde(default, alias = "double_value")]
    double_value: Option<f64>,
    #[serde(default, alias = "array_value")]
    array_value: Option<ValuesJson<AnyValueJson>>,
    #[serde(default, alias = "kvlist_value")]
    kvlist_value: Option<ValuesJson<KeyValueJson>>,
    /// Base64 in proto3 JSON. The content is never shown, so it stays opaque.
    #[serde(default, alias = "bytes_value")]
    bytes_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ValuesJson<T> {
    #[serde(default = "Vec::new", deserialize_with = "nullable")]
    values: Vec<T>,
}

impl From<AnyValueJson> for AnyValue {
    fn from(json: AnyValueJson) -> Self {
        let value = if let Some(s) = json.string_value {
            Some(any_value::Value::StringValue(s))
        } else if let Some(b) = json.bool_value {
            Some(any_value::Value::BoolValue(b))
        } else if let Some(n) = json.int_value {
            Some(any_value::Value::IntValue(n))
        } else if let Some(n) = json.double_value {
            Some(any_value::Value::DoubleValue(n))
        } else if let Some(array) = json.array_value {
            let mut out = ArrayValue::new();
            out.values = array.values.into_iter().map(AnyValue::from).collect();
            Some(any_value::Value::ArrayValue(out))
        } else if let Some(kvlist) = json.kvlist_value {
            let mut out = KeyValueList::new();
            out.values = kvlist.values.into_iter().map(KeyValue::from).collect();
            Some(any_value::Value::KvlistValue(out))
        } else {
            json.bytes_value
                .map(|b| any_value::Value::BytesValue(b.into_bytes()))
        };

        let mut any = AnyValue::new();
        any.value = value;
        any
    }
}

/// Decode a successful search body according to its `x-deepql-type`.
pub(super) fn decode_payload(payload_type: &str, body: &[u8]) -> Result<DomainRecord, QueryError> {
    let json_err = |e: serde_json::Error| QueryError::bad_request(format!("response failed: {e}"));

    match payload_type {
        "" => {
            let envelope: SearchEnvelope = serde_json::from_slice(body).map_err(json_err)?;
            Ok(DomainRecord::Search {
                snapshots: envelope.snapshots,
                tracepoints: envelope.tracepoints.map(TracepointEnvelope::into_configs),
            })
        }
        TRACEPOINT_PAYLOAD => {
            let envelope: TracepointEnvelope = serde_json::from_slice(body).map_err(json_err)?;
            Ok(DomainRecord::Tracepoints {
                configs: envelope.into_configs(),
                origin: super::TracepointOrigin::Listed,
            })
        }
        other => {
            tracing::debug!(payload_type = other, "ignoring unsupported search payload");
            Ok(DomainRecord::Empty)
        }
    }
}

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

/// Accept a decimal given either as a JSON string or a JSON number.
fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::String(s)) => s,
        Some(StringOrNumber::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

/// Proto3 JSON encodes int64 as a string; plain numbers are accepted too.
fn optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Some(StringOrNumber::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("{n} is not an int64"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(body: &str) -> (Vec<SearchResultMetadata>, Option<Vec<TracePointConfig>>) {
        match decode_payload("", body.as_bytes()).unwrap() {
            DomainRecord::Search {
                snapshots,
                tracepoints,
            } => (snapshots, tracepoints),
            other => panic!("unexpected record: {other:?}"),
        }
    }

    fn tracepoints(payload_type: &str, body: &str) -> Vec<TracePointConfig> {
        match decode_payload(payload_type, body.as_bytes()).unwrap() {
            DomainRecord::Tracepoints { configs, .. } => configs,
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn test_search_envelope() {
        let (snapshots, tracepoints) = search(
            r#"{"snapshots": [{
                "snapshotID": "abc", "serviceName": "api", "filePath": "main.py",
                "lineNo": 12, "startTimeUnixNano": "1700000000000000000", "durationNano": "1500"
            }]}"#,
        );
        assert!(tracepoints.is_none());
        assert_eq!(
            snapshots,
            vec![SearchResultMetadata {
                snapshot_id: "abc".into(),
                service_name: "api".into(),
                file_path: "main.py".into(),
                line_no: 12,
                start_time_unix_nano: "1700000000000000000".into(),
                duration_nano: "1500".into(),
            }]
        );
    }

    #[test]
    fn test_search_envelope_missing_and_null_fields() {
        let (snapshots, _) = search(r#"{}"#);
        assert!(snapshots.is_empty());

        let (snapshots, _) = search(r#"{"snapshots": null}"#);
        assert!(snapshots.is_empty());

        let (snapshots, _) = search(r#"{"snapshots": [{"snapshotID": "x", "durationNano": 20}]}"#);
        assert_eq!(snapshots[0].snapshot_id, "x");
        assert_eq!(snapshots[0].duration_nano, "20");
        assert_eq!(snapshots[0].start_time_unix_nano, "");
    }

    #[test]
    fn test_null_scalar_fields_read_as_missing() {
        let (snapshots, _) = search(
            r#"{"snapshots": [{
                "snapshotID": "abc", "serviceName": null, "filePath": null,
                "lineNo": null, "startTimeUnixNano": null, "durationNano": null
            }]}"#,
        );
        assert_eq!(
            snapshots,
            vec![SearchResultMetadata {
                snapshot_id: "abc".into(),
                ..Default::default()
            }]
        );

        let configs = tracepoints(
            "tracepoint",
            r#"{"type": null, "all": [{"id": "a", "path": null, "line_number": null}]}"#,
        );
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].path, "");
        assert_eq!(configs[0].line_number, 0);
    }

    #[test]
    fn test_search_envelope_with_tracepoints() {
        let (_, tracepoints) = search(
            r#"{"snapshots": [], "tracepoints": {"type": "list", "affected": [{"ID": "tp-1", "path": "a.py"}]}}"#,
        );
        let tracepoints = tracepoints.unwrap();
        assert_eq!(tracepoints.len(), 1);
        assert_eq!(tracepoints[0].id, "tp-1");
    }

    #[test]
    fn test_tracepoint_list_uses_affected() {
        let configs = tracepoints(
            "tracepoint",
            r#"{"type": "list",
                "affected": [{"id": "a", "path": "x.py", "line_number": 3}],
                "all": [{"id": "b"}, {"id": "c"}]}"#,
        );
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].id, "a");
        assert_eq!(configs[0].line_number, 3);
    }

    #[test]
    fn test_tracepoint_other_uses_all() {
        let configs = tracepoints(
            "tracepoint",
            r#"{"type": "other", "affected": [{"id": "a"}], "all": [{"id": "b"}, {"id": "c"}]}"#,
        );
        let ids: Vec<&str> = configs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_tracepoint_json_fields() {
        let configs = tracepoints(
            "tracepoint",
            r#"{"type": "list", "affected": [{
                "ID": "tp", "path": "svc/app.py", "lineNumber": 7,
                "args": {"fire_count": "5"}, "watches": ["x", "y"],
                "targeting": [
                    {"key": "service.name", "value": {"stringValue": "api"}},
                    {"key": "pid", "value": {"intValue": "42"}},
                    {"key": "ratio", "value": {"double_value": 0.5}},
                    {"key": "tags", "value": {"arrayValue": {"values": [{"boolValue": true}]}}},
                    {"key": "nested", "value": {"kvlistValue": {"values": [{"key": "k", "value": {"intValue": 1}}]}}},
                    {"key": "raw", "value": {"bytesValue": "AAE="}},
                    {"key": "empty"}
                ]
            }]}"#,
        );
        let tp = &configs[0];
        assert_eq!(tp.id, "tp");
        assert_eq!(tp.line_number, 7);
        assert_eq!(tp.args["fire_count"], "5");
        assert_eq!(tp.watches, vec!["x", "y"]);
        assert_eq!(tp.targeting.len(), 7);

        let value = |i: usize| tp.targeting[i].value.as_ref().and_then(|v| v.value.clone());
        assert_eq!(value(0), Some(any_value::Value::StringValue("api".into())));
        assert_eq!(value(1), Some(any_value::Value::IntValue(42)));
        assert_eq!(value(2), Some(any_value::Value::DoubleValue(0.5)));
        assert!(matches!(value(3), Some(any_value::Value::ArrayValue(a)) if a.values.len() == 1));
        assert!(matches!(value(4), Some(any_value::Value::KvlistValue(l)) if l.values[0].key == "k"));
        assert!(matches!(value(5), Some(any_value::Value::BytesValue(_))));
        assert!(tp.targeting[6].value.is_none());
    }

    #[test]
    fn test_null_collections() {
        let configs = tracepoints(
            "tracepoint",
            r#"{"type": "list", "affected": [{"id": "a", "args": null, "watches": null, "targeting": null}]}"#,
        );
        assert!(configs[0].args.is_empty());
        assert!(configs[0].watches.is_empty());
        assert!(configs[0].targeting.is_empty());
    }

    #[test]
    fn test_unknown_payload_type_is_empty() {
        let record = decode_payload("metrics", b"not even json").unwrap();
        assert_eq!(record, DomainRecord::Empty);
    }

    #[test]
    fn test_malformed_json() {
        let err = decode_payload("", b"{\"snapshots\": [").unwrap_err();
        assert!(matches!(err, QueryError::BadRequest(ref m) if m.starts_with("response failed:")));

        let err = decode_payload("tracepoint", b"\"text\"").unwrap_err();
        assert!(matches!(err, QueryError::BadRequest(_)));
    }

    #[test]
    fn test_bad_int_value() {
        let err = decode_payload(
            "tracepoint",
            br#"{"type": "list", "affected": [{"targeting": [{"key": "k", "value": {"intValue": "abc"}}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::BadRequest(_)));
    }
}
