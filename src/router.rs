//! Query dispatch.
//!
//! A [`DispatchRequest`] fans out over a worker pool, one task per query.
//! Each task issues a single backend call, decodes the reply, and builds the
//! frames for its `refId`. Failures stay in the slot of the query that
//! produced them.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::channel;
use std::sync::Arc;

use tracing::{debug, warn};
use workerpool::thunk::{Thunk, ThunkWorker};
use workerpool::Pool;

use crate::backend::{merge_headers, BackendRequest, HttpTransport, Transport, ACCEPT_PROTOBUF};
use crate::config::DatasourceSettings;
use crate::decode::{decode, EndpointKind, TracepointOrigin};
use crate::error::QueryError;
use crate::frame::{frames_for, Frame};
use crate::query::{DispatchRequest, Query, QueryModel, QueryType, TracepointQueryType};

/// Frames produced by one query, or the error that stopped it.
pub type QueryResult = Result<Vec<Frame>, QueryError>;

const SEARCH_PATH: &str = "/api/search";
const SNAPSHOTS_PATH: &str = "/api/snapshots";
const TRACEPOINTS_PATH: &str = "/api/tracepoints";

/// Routes each query of a request to its handler.
pub struct QueryRouter {
    transport: Arc<dyn Transport>,
    /// Headers from the data source settings, sent on every request.
    headers: BTreeMap<String, String>,
    max_parallel_queries: usize,
}

impl QueryRouter {
    pub fn new(transport: Arc<dyn Transport>, max_parallel_queries: usize) -> Self {
        Self {
            transport,
            headers: BTreeMap::new(),
            max_parallel_queries: max_parallel_queries.max(1),
        }
    }

    /// Router talking HTTP to the backend described by `settings`.
    pub fn from_settings(settings: &DatasourceSettings) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(settings)?;
        let mut router = Self::new(Arc::new(transport), settings.max_parallel_queries);
        router.headers = settings.headers.clone();
        Ok(router)
    }

    /// Run every query of `request` and collect one result per distinct
    /// `refId`. When a `refId` repeats, the last query with it wins.
    pub fn dispatch(&self, request: DispatchRequest) -> HashMap<String, QueryResult> {
        let DispatchRequest { headers, queries } = request;
        let count = queries.len();
        debug!(queries = count, "dispatching request");

        let caller_headers = Arc::new(merge_headers(&self.headers, &headers));

        let pool = Pool::<ThunkWorker<(usize, String, QueryResult)>>::new(
            self.max_parallel_queries.min(count.max(1)),
        );
        let (tx, rx) = channel();

        for (index, query) in queries.into_iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let headers = Arc::clone(&caller_headers);
            pool.execute_to(
                tx.clone(),
                Thunk::of(move || {
                    let ref_id = query.ref_id.clone();
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        handle_query(transport.as_ref(), &headers, &query)
                    }))
                    .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));
                    (index, ref_id, result)
                }),
            );
        }
        drop(tx);
        pool.join();

        let mut completed: Vec<(usize, String, QueryResult)> = rx.iter().collect();
        completed.sort_by_key(|(index, _, _)| *index);

        let mut responses = HashMap::with_capacity(completed.len());
        for (_, ref_id, result) in completed {
            if let Err(err) = &result {
                warn!(ref_id = %ref_id, status = err.status(), "query failed: {}", err);
            }
            responses.insert(ref_id, result);
        }
        responses
    }
}

/// Run one query and stamp its `refId` on the resulting frames.
pub fn handle_query(
    transport: &dyn Transport,
    headers: &BTreeMap<String, String>,
    query: &Query,
) -> QueryResult {
    let frames = match query.query_type {
        QueryType::Deepql => query_deepql(transport, headers, query)?,
        QueryType::Byid => query_by_id(transport, headers, query)?,
        QueryType::Tracepoint => query_tracepoint(transport, headers, query)?,
        QueryType::Unknown => {
            debug!(ref_id = %query.ref_id, "ignoring query with unknown type");
            return Ok(Vec::new());
        }
    };

    Ok(frames
        .into_iter()
        .map(|frame| frame.with_ref_id(&query.ref_id))
        .collect())
}

/// A handler that panics still fills its slot.
fn panic_error(payload: &(dyn Any + Send)) -> QueryError {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    QueryError::bad_request(format!("query panicked: {message}"))
}

fn parse_model(query: &Query) -> Result<QueryModel, QueryError> {
    QueryModel::parse(&query.raw_params)
        .map_err(|e| QueryError::bad_request(format!("json unmarshal: {e}")))
}

/// Execute `request` and turn the reply into frames.
fn fetch(
    transport: &dyn Transport,
    headers: &BTreeMap<String, String>,
    request: BackendRequest,
    kind: EndpointKind,
) -> QueryResult {
    let response = transport
        .execute(request.with_headers(headers))
        .map_err(|e| QueryError::bad_request(format!("request failed: {e:#}")))?;
    let record = decode(&kind, response)?;
    frames_for(&record).map_err(|e| QueryError::bad_request(format!("conversion failed: {e:#}")))
}

/// DeepQL search over the query's time range.
pub fn query_deepql(
    transport: &dyn Transport,
    headers: &BTreeMap<String, String>,
    query: &Query,
) -> QueryResult {
    let model = parse_model(query)?;
    debug!(ref_id = %query.ref_id, q = %model.query, "deepql search");

    let request = BackendRequest::get(SEARCH_PATH)
        .with_query("q", &model.query)
        .with_query("limit", model.effective_limit())
        .with_query("start", query.time_range.from.timestamp())
        .with_query("end", query.time_range.to.timestamp());
    fetch(transport, headers, request, EndpointKind::Search)
}

/// Fetch a single snapshot by id.
pub fn query_by_id(
    transport: &dyn Transport,
    headers: &BTreeMap<String, String>,
    query: &Query,
) -> QueryResult {
    let model = parse_model(query)?;
    debug!(ref_id = %query.ref_id, id = %model.query, "snapshot lookup");

    let request = BackendRequest::get(format!("{SNAPSHOTS_PATH}/{}", model.query))
        .with_header("Accept", ACCEPT_PROTOBUF);
    fetch(
        transport,
        headers,
        request,
        EndpointKind::Snapshot { id: model.query },
    )
}

/// List, create, or delete tracepoints.
pub fn query_tracepoint(
    transport: &dyn Transport,
    headers: &BTreeMap<String, String>,
    query: &Query,
) -> QueryResult {
    let model = parse_model(query)?;
    let operation = model.tp_query_type.unwrap_or_default();
    debug!(ref_id = %query.ref_id, ?operation, "tracepoint query");

    let (request, origin) = match operation {
        TracepointQueryType::List => (
            BackendRequest::get(TRACEPOINTS_PATH),
            TracepointOrigin::Listed,
        ),
        TracepointQueryType::Create => {
            let create = model.tp_create.unwrap_or_default();
            if create.path.is_empty() {
                return Err(QueryError::bad_request(
                    "tracepoint create requires a path",
                ));
            }
            (
                BackendRequest::post_json(TRACEPOINTS_PATH, &create.request_body()),
                TracepointOrigin::Created,
            )
        }
        TracepointQueryType::Delete => {
            let id = model.query.trim();
            if id.is_empty() {
                return Err(QueryError::bad_request(
                    "tracepoint delete requires an id",
                ));
            }
            (
                BackendRequest::delete(format!("{TRACEPOINTS_PATH}/{id}")),
                TracepointOrigin::Deleted,
            )
        }
    };

    fetch(
        transport,
        headers,
        request.with_header("Accept", ACCEPT_PROTOBUF),
        EndpointKind::Tracepoints(origin),
    )
}
