//! Decoding of raw backend replies into domain records.
//!
//! Binary endpoints answer with protobuf messages; the search endpoint
//! answers with JSON whose schema is chosen by the `x-deepql-type` response
//! header. Every decoder takes ownership of the [`BackendResponse`], so the
//! body is released on every exit path.

mod search;

pub use search::SearchResultMetadata;

use protobuf::Message;

use crate::backend::BackendResponse;
use crate::error::QueryError;
use crate::proto::{
    CreateTracepointResponse, DeleteTracepointResponse, Snapshot, TracePointConfig,
    TracepointList,
};

/// Response header selecting the search payload schema.
pub const DEEPQL_TYPE_HEADER: &str = "x-deepql-type";

/// Which tracepoint operation produced a tracepoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracepointOrigin {
    Listed,
    Created,
    Deleted,
}

/// Endpoint a response came from, which fixes how it is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    /// `GET /api/snapshots/{id}`.
    Snapshot { id: String },
    /// `/api/tracepoints` in its list, create, or delete form.
    Tracepoints(TracepointOrigin),
    /// `GET /api/search`.
    Search,
}

/// Closed set of records the decoder produces.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainRecord {
    Snapshot(Box<Snapshot>),
    Tracepoints {
        configs: Vec<TracePointConfig>,
        origin: TracepointOrigin,
    },
    Search {
        snapshots: Vec<SearchResultMetadata>,
        tracepoints: Option<Vec<TracePointConfig>>,
    },
    /// A well-formed reply with nothing to show.
    Empty,
}

/// Decode `response` according to the endpoint it came from.
pub fn decode(kind: &EndpointKind, response: BackendResponse) -> Result<DomainRecord, QueryError> {
    match kind {
        EndpointKind::Snapshot { id } => decode_snapshot(response, id),
        EndpointKind::Tracepoints(origin) => decode_tracepoints(response, *origin),
        EndpointKind::Search => decode_search(response),
    }
}

/// Decode a snapshot lookup. A 404 means the id is unknown to the backend.
pub fn decode_snapshot(response: BackendResponse, id: &str) -> Result<DomainRecord, QueryError> {
    if response.status == 404 {
        return Err(QueryError::NotFound(id.to_string()));
    }
    let body = success_body(response)?;
    let snapshot = Snapshot::parse_from_bytes(&body)
        .map_err(|e| QueryError::bad_request(format!("response failed: {e}")))?;
    Ok(DomainRecord::Snapshot(Box::new(snapshot)))
}

/// Decode the reply of a tracepoint list, create, or delete call.
pub fn decode_tracepoints(
    response: BackendResponse,
    origin: TracepointOrigin,
) -> Result<DomainRecord, QueryError> {
    let body = success_body(response)?;
    let parse_err = |e: protobuf::Error| QueryError::bad_request(format!("response failed: {e}"));

    let configs = match origin {
        TracepointOrigin::Listed => TracepointList::parse_from_bytes(&body)
            .map_err(parse_err)?
            .tracepoints,
        TracepointOrigin::Created => CreateTracepointResponse::parse_from_bytes(&body)
            .map_err(parse_err)?
            .created
            .into_option()
            .into_iter()
            .collect(),
        TracepointOrigin::Deleted => DeleteTracepointResponse::parse_from_bytes(&body)
            .map_err(parse_err)?
            .deleted
            .into_option()
            .into_iter()
            .collect(),
    };

    Ok(DomainRecord::Tracepoints { configs, origin })
}

/// Decode a DeepQL search reply.
pub fn decode_search(response: BackendResponse) -> Result<DomainRecord, QueryError> {
    let payload_type = response
        .header(DEEPQL_TYPE_HEADER)
        .unwrap_or_default()
        .to_string();
    let body = success_body(response)?;
    search::decode_payload(&payload_type, &body)
}

/// Read the body of a 2xx response. Other statuses become a `BadRequest`
/// carrying the status and whatever body text the backend sent.
fn success_body(mut response: BackendResponse) -> Result<Vec<u8>, QueryError> {
    let body = response
        .read_body()
        .map_err(|e| QueryError::bad_request(format!("read failed: {e}")));

    if !response.is_success() {
        let text = body
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .unwrap_or_default();
        return Err(QueryError::bad_request(format!(
            "unexpected status {}: {}",
            response.status, text
        )));
    }

    body
}
