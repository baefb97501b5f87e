//! Per-query error taxonomy.
//!
//! Errors never abort a whole dispatch; each one is attached to the result
//! slot of the query that produced it.

use std::fmt;

/// Error attached to a single query's result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Bad parameters, request/transport failure, unreadable or undecodable
    /// body, or a non-2xx backend status.
    BadRequest(String),
    /// The requested snapshot does not exist. Carries the id as queried.
    NotFound(String),
}

impl QueryError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        QueryError::BadRequest(message.into())
    }

    /// HTTP-style status code reported alongside the error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            QueryError::BadRequest(_) => 400,
            QueryError::NotFound(_) => 404,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::BadRequest(message) => write!(f, "{message}"),
            QueryError::NotFound(id) => write!(f, "Cannot find snapshot with id: {id}"),
        }
    }
}

impl std::error::Error for QueryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = QueryError::NotFound("123".to_string());
        assert_eq!(err.to_string(), "Cannot find snapshot with id: 123");
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_bad_request_message() {
        let err = QueryError::bad_request("read failed: eof");
        assert_eq!(err.to_string(), "read failed: eof");
        assert_eq!(err.status(), 400);
    }
}
