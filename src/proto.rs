//! Generated protobuf types for the DEEP wire format.
//!
//! The messages are compiled from `proto/*.proto` by the build script. Only
//! the handful of types the decoder and frame builder touch are re-exported.

#[allow(clippy::all)]
#[allow(non_snake_case)]
#[allow(non_camel_case_types)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/protos/mod.rs"));
}

pub use generated::common::{any_value, AnyValue, ArrayValue, KeyValue, KeyValueList};
pub use generated::tracepoint::{
    watch_result, CreateTracepointResponse, DeleteTracepointResponse, Snapshot, StackFrame,
    TracePointConfig, TracepointList, Variable, VariableID, WatchResult, WatchSource,
};
