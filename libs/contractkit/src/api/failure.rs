//! Failure translation at the handler boundary
//!
//! Every handler invocation ends here when it fails. A failure that carries its
//! own status (`DomainFailure`) keeps that status and message; anything else is
//! reported as 500 with the failure's message.

use axum::http::StatusCode;
use std::any::Any;
use std::error::Error as StdError;

use crate::api::problem::Problem;

/// Detail used when an unclassified failure has no message of its own.
pub const UNHANDLED_EXCEPTION: &str = "Unhandled exception was thrown";

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// A failure raised by contract code that names the HTTP status to answer with.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DomainFailure {
    status: StatusCode,
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl DomainFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause; it is logged but never shown to callers.
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Translate a handler failure into a problem.
pub fn translate_failure(err: &anyhow::Error) -> Problem {
    // downcast_ref also sees through `.context(...)` layers
    if let Some(domain) = err.downcast_ref::<DomainFailure>() {
        tracing::warn!(
            status = domain.status().as_u16(),
            error = %domain,
            cause = ?domain.source(),
            "operation failed with domain failure"
        );
        return Problem::from_status(domain.status(), domain.message());
    }

    tracing::error!(error = ?err, "operation failed with unhandled error");
    unclassified(&err.to_string())
}

/// Translate a panic payload caught around a handler invocation.
pub fn translate_panic(payload: Box<dyn Any + Send>) -> Problem {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();

    tracing::error!(panic = %message, "operation panicked");
    unclassified(&message)
}

fn unclassified(message: &str) -> Problem {
    let detail = if message.trim().is_empty() {
        UNHANDLED_EXCEPTION
    } else {
        message
    };
    Problem::from_status(StatusCode::INTERNAL_SERVER_ERROR, detail)
}
