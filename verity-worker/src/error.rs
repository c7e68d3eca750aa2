//! Error Types for the Job Control Surface
//!
//! This module defines the errors returned by [`crate::JobService`]:
//! - ServiceError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//!
//! Codes serialize as `SCREAMING_SNAKE_CASE` and carry an HTTP status hint
//! for whatever outer surface exposes the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use verity_core::{EntityType, StorageError, VerityError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for job control responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Job id is not a valid UUID
    InvalidJobId,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Referenced transcript does not exist
    TranscriptNotFound,

    /// Requested job does not exist
    JobNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Job has not completed, so there are no results to return
    ResultsNotReady,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Job could not be created or queued
    AnalysisCreationError,

    /// Internal error
    InternalError,
}

impl ErrorCode {
    /// HTTP status code hint for this error code.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidJobId => 400,
            ErrorCode::TranscriptNotFound | ErrorCode::JobNotFound => 404,
            ErrorCode::ResultsNotReady => 409,
            ErrorCode::AnalysisCreationError | ErrorCode::InternalError => 500,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJobId => "Invalid job ID format",
            ErrorCode::TranscriptNotFound => "Transcript not found",
            ErrorCode::JobNotFound => "Analysis job not found",
            ErrorCode::ResultsNotReady => "Analysis results are not ready",
            ErrorCode::AnalysisCreationError => "Failed to create analysis job",
            ErrorCode::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// SERVICE ERROR STRUCT
// ============================================================================

/// Structured error for job control operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an error using the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    pub fn invalid_job_id(raw: &str) -> Self {
        Self::new(
            ErrorCode::InvalidJobId,
            format!("Invalid job ID format: {}", raw),
        )
    }

    pub fn transcript_not_found(transcript_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TranscriptNotFound,
            format!("Transcript {} not found", transcript_id),
        )
    }

    pub fn job_not_found(job_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::JobNotFound,
            format!("Analysis job {} not found", job_id),
        )
    }

    pub fn results_not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResultsNotReady, message)
    }

    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AnalysisCreationError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Fallback mapping for errors not handled at the call site.
impl From<VerityError> for ServiceError {
    fn from(err: VerityError) -> Self {
        match &err {
            VerityError::Storage(StorageError::NotFound {
                entity_type: EntityType::Job,
                id,
            }) => ServiceError::job_not_found(id),
            VerityError::Storage(StorageError::NotFound {
                entity_type: EntityType::Transcript,
                id,
            }) => ServiceError::transcript_not_found(id),
            _ => {
                tracing::error!(error = %err, "Unhandled job service error");
                ServiceError::internal_error(err.to_string())
            }
        }
    }
}

/// Result type alias for job control operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidJobId.http_status(), 400);
        assert_eq!(ErrorCode::TranscriptNotFound.http_status(), 404);
        assert_eq!(ErrorCode::JobNotFound.http_status(), 404);
        assert_eq!(ErrorCode::ResultsNotReady.http_status(), 409);
        assert_eq!(ErrorCode::AnalysisCreationError.http_status(), 500);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ServiceError::transcript_not_found("abc");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("\"TRANSCRIPT_NOT_FOUND\""));
        assert!(!json.contains("details"));

        let deserialized: ServiceError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_from_verity_error() {
        let id = Uuid::now_v7();
        assert_eq!(
            ServiceError::from(VerityError::job_not_found(id)).code,
            ErrorCode::JobNotFound
        );
        assert_eq!(
            ServiceError::from(VerityError::transcript_not_found(id)).code,
            ErrorCode::TranscriptNotFound
        );
        assert_eq!(
            ServiceError::from(VerityError::Cancelled).code,
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::from_code(ErrorCode::ResultsNotReady);
        assert_eq!(
            err.to_string(),
            "ResultsNotReady: Analysis results are not ready"
        );
    }
}
