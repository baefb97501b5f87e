//! deep-datasource - query backend for the DEEP dynamic snapshot service.
//!
//! Turns typed query descriptions into backend calls and converts the
//! replies (binary protobuf or JSON search payloads) into tabular frames
//! with per-column display metadata and navigation links.
//!
//! # Modules
//!
//! - [`router`] - per-query dispatch and fan-out
//! - [`backend`] - the [`Transport`] seam and its HTTP implementation
//! - [`decode`] - backend replies to domain records
//! - [`frame`] - domain records to frames
//! - [`flatten`] - attribute values to JSON scalars
//! - [`health`] - backend liveness probe
//!
//! # Example
//!
//! ```no_run
//! use deep_datasource::{DatasourceSettings, DispatchRequest, QueryRouter};
//!
//! let settings = DatasourceSettings::new("http://localhost:3100");
//! let router = QueryRouter::from_settings(&settings).expect("Failed to build router");
//! let request: DispatchRequest = serde_json::from_str(
//!     r#"{"queries": [{"refId": "A", "queryType": "byid", "json": {"query": "abc"}}]}"#,
//! )
//! .expect("Invalid request");
//! let results = router.dispatch(request);
//! assert!(results.contains_key("A"));
//! ```

pub mod backend;
pub mod config;
pub mod decode;
pub mod error;
pub mod flatten;
pub mod frame;
pub mod health;
pub mod proto;
pub mod query;
pub mod router;

pub use backend::{BackendRequest, BackendResponse, HttpTransport, Method, Transport};
pub use config::DatasourceSettings;
pub use decode::{DomainRecord, SearchResultMetadata};
pub use error::QueryError;
pub use frame::{Field, FieldValues, Frame, FrameMeta, NavigationLink, Visualization};
pub use health::{check_health, HealthCheckResult, HealthStatus};
pub use query::{DispatchRequest, Query, QueryModel, QueryType};
pub use router::{QueryResult, QueryRouter};
