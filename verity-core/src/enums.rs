//! Enum types for Verity entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Entity type discriminator used in storage errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Job,
    Transcript,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Job => write!(f, "job"),
            EntityType::Transcript => write!(f, "transcript"),
        }
    }
}

// ============================================================================
// JOB STATUS
// ============================================================================

/// Lifecycle status of an analysis job.
///
/// Transitions only move forward: `Pending -> Processing -> {Completed, Failed}`.
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and queued, not yet picked up by a worker
    #[default]
    Pending,
    /// A worker is running the pipeline
    Processing,
    /// Pipeline finished and results are stored
    Completed,
    /// Job ended with an error message
    Failed,
}

impl JobStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, JobStatusParseError> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(JobStatusParseError(s.to_string())),
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the lifecycle; terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Check whether moving from `self` to `next` is a forward edge.
    ///
    /// Re-applying the current status is not a transition; callers treat
    /// that case as an idempotent no-op instead.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Processing) => true,
            // Enqueue failure fails the job before any worker sees it.
            (JobStatus::Pending, JobStatus::Failed) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (JobStatus::Processing, JobStatus::Failed) => true,
            _ => false,
        }
    }

    /// Whether `next` would move the status backwards.
    pub fn is_regression(&self, next: JobStatus) -> bool {
        next.rank() < self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid job status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusParseError(pub String);

impl fmt::Display for JobStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid job status: {}", self.0)
    }
}

impl std::error::Error for JobStatusParseError {}

// ============================================================================
// VERDICT
// ============================================================================

/// Categorical judgment on a single claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    True,
    False,
    PartiallyTrue,
    #[default]
    Unverifiable,
}

impl Verdict {
    /// All verdicts, in reporting order.
    pub const ALL: [Verdict; 4] = [
        Verdict::True,
        Verdict::False,
        Verdict::PartiallyTrue,
        Verdict::Unverifiable,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::PartiallyTrue => "partially_true",
            Verdict::Unverifiable => "unverifiable",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, VerdictParseError> {
        match s.trim().to_lowercase().as_str() {
            "true" => Ok(Verdict::True),
            "false" => Ok(Verdict::False),
            "partially_true" => Ok(Verdict::PartiallyTrue),
            "unverifiable" => Ok(Verdict::Unverifiable),
            _ => Err(VerdictParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Verdict {
    type Err = VerdictParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid verdict string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictParseError(pub String);

impl fmt::Display for VerdictParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid verdict: {}", self.0)
    }
}

impl std::error::Error for VerdictParseError {}

// ============================================================================
// TESTS
// ============================================================================
