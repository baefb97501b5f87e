//! Common test utilities for deep-datasource integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use deep_datasource::proto::{any_value, AnyValue, KeyValue, Snapshot, TracePointConfig};
use deep_datasource::{BackendRequest, BackendResponse, Transport};
use protobuf::{Message, MessageField};
use serde_json::{json, Value};

type Handler = Box<dyn Fn(&BackendRequest) -> anyhow::Result<BackendResponse> + Send + Sync>;

/// In-process [`Transport`] that answers through a closure and records
/// every request it receives.
pub struct StubTransport {
    handler: Handler,
    requests: Mutex<Vec<BackendRequest>>,
}

impl StubTransport {
    pub fn new(
        handler: impl Fn(&BackendRequest) -> anyhow::Result<BackendResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same status and body.
    pub fn fixed(status: u16, body: Vec<u8>) -> Self {
        Self::new(move |_| Ok(BackendResponse::from_bytes(status, body.clone())))
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn execute(&self, request: BackendRequest) -> anyhow::Result<BackendResponse> {
        let response = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// A query in the wire form the router accepts.
pub fn query(ref_id: &str, query_type: &str, params: Value) -> Value {
    json!({
        "refId": ref_id,
        "queryType": query_type,
        "json": params,
        "timeRange": {"from": "2024-03-01T00:00:00Z", "to": "2024-03-01T00:15:00Z"},
    })
}

pub fn string_attribute(key: &str, value: &str) -> KeyValue {
    let mut any = AnyValue::new();
    any.value = Some(any_value::Value::StringValue(value.to_string()));
    let mut kv = KeyValue::new();
    kv.key = key.to_string();
    kv.value = MessageField::some(any);
    kv
}

pub fn snapshot_bytes(id: &[u8]) -> Vec<u8> {
    let mut snapshot = Snapshot::new();
    snapshot.id = id.to_vec();
    snapshot.ts_nanos = 1_709_251_200_000_000_000;
    snapshot.duration_nanos = 2_500;
    snapshot
        .attributes
        .push(string_attribute("service.name", "checkout"));
    snapshot.write_to_bytes().unwrap()
}

pub fn tracepoint(id: &str, path: &str, line_number: u32) -> TracePointConfig {
    let mut tp = TracePointConfig::new();
    tp.id = id.to_string();
    tp.path = path.to_string();
    tp.line_number = line_number;
    tp.targeting.push(string_attribute("service.name", "checkout"));
    tp
}
