//! User-facing error kinds.
//!
//! Every failure that reaches a response envelope is one of these variants.
//! Each carries a stable machine-readable code alongside its message.

use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced to callers of the command layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Plan id is invalid or the plan has never received a record.
    #[error("Plan {0} was not found.")]
    PlanNotFound(i64),

    /// Plan exists but has no usable records yet.
    #[error("Plan {0} is not finished or has no metrics yet.")]
    NotReady(i64),

    /// Every plan id of a group request was missing or empty.
    #[error("No data available for the given plan_ids.")]
    NoData,

    /// Ingested record failed validation.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The generative-text backend could not produce a response.
    #[error("Text generation backend is unavailable: {0}")]
    BackendUnavailable(String),

    /// Unexpected fault. The message never includes internal detail.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable code reported alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            ServiceError::NotReady(_) => "NOT_READY",
            ServiceError::NoData => "NO_DATA",
            ServiceError::InvalidRecord(_) => "INVALID_RECORD",
            ServiceError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Wrap an unexpected fault, logging the detail and keeping it out of
    /// the user message.
    pub fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", context, detail);
        ServiceError::Internal(format!("An error occurred while {}.", context))
    }
}
