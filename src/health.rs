//! Backend liveness probe.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{BackendRequest, Transport};

const ECHO_PATH: &str = "/api/echo";
const ECHO_BODY: &[u8] = b"echo\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheckResult {
    fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!("health check failed: {}", message);
        Self {
            status: HealthStatus::Error,
            message,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Probe `GET /api/echo`. The backend is healthy only when it answers 200
/// with exactly `echo\n`. Never fails; problems are reported in the result.
pub fn check_health(
    transport: &dyn Transport,
    headers: &BTreeMap<String, String>,
) -> HealthCheckResult {
    debug!("checking backend health");

    let mut response = match transport.execute(BackendRequest::get(ECHO_PATH).with_headers(headers))
    {
        Ok(response) => response,
        Err(e) => return HealthCheckResult::error(format!("{e:#}")),
    };

    if response.status != 200 {
        return HealthCheckResult::error(format!("Status code {} returned", response.status));
    }

    let body = match response.read_body() {
        Ok(body) => body,
        Err(_) => return HealthCheckResult::error("Could not parse response body"),
    };

    if body != ECHO_BODY {
        return HealthCheckResult::error("Unexpected response from DEEP. Is this a DEEP instance?");
    }

    HealthCheckResult {
        status: HealthStatus::Ok,
        message: "Data source is working".to_string(),
    }
}
