//! Entity types for analysis jobs and their results

use crate::{new_entity_id, JobStatus, QueueError, StorageError, Timestamp, Verdict};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// FACT CHECK
// ============================================================================

/// Clamp a confidence score into `[0.0, 1.0]`. NaN maps to 0.0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One verified claim.
///
/// Created during the fact-checker stage and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheck {
    /// The claim text as extracted from the transcript
    pub claim: String,
    /// Verdict reached for the claim
    pub verdict: Verdict,
    /// Confidence in the verdict, always within `[0.0, 1.0]`
    pub confidence: f64,
    /// Free-text explanation
    pub evidence: String,
    /// URLs taken from the search results gathered for this claim
    pub sources: Vec<String>,
}

impl FactCheck {
    /// Create a fact check, clamping the confidence score.
    pub fn new(
        claim: impl Into<String>,
        verdict: Verdict,
        confidence: f64,
        evidence: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            claim: claim.into(),
            verdict,
            confidence: clamp_confidence(confidence),
            evidence: evidence.into(),
            sources,
        }
    }

    /// An unverifiable result with zero confidence and no sources.
    pub fn unverifiable(claim: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self::new(claim, Verdict::Unverifiable, 0.0, evidence, Vec::new())
    }
}

/// Count of fact checks per verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictTally {
    pub true_count: usize,
    pub false_count: usize,
    pub partially_true_count: usize,
    pub unverifiable_count: usize,
}

impl VerdictTally {
    /// Tally a slice of fact checks.
    pub fn from_checks(checks: &[FactCheck]) -> Self {
        let mut tally = Self::default();
        for check in checks {
            tally.record(check.verdict);
        }
        tally
    }

    /// Record one verdict.
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::True => self.true_count += 1,
            Verdict::False => self.false_count += 1,
            Verdict::PartiallyTrue => self.partially_true_count += 1,
            Verdict::Unverifiable => self.unverifiable_count += 1,
        }
    }

    /// Total number of recorded verdicts.
    pub fn total(&self) -> usize {
        self.true_count + self.false_count + self.partially_true_count + self.unverifiable_count
    }
}

// ============================================================================
// ANALYSIS RESULTS
// ============================================================================

/// Combined output of the three pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub summary: Option<String>,
    pub takeaways: Vec<String>,
    pub fact_checks: Vec<FactCheck>,
}

// ============================================================================
// ANALYSIS JOB
// ============================================================================

/// Result of applying a status change to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The job moved to the new status
    Applied,
    /// The job was already in that status; nothing changed
    Unchanged,
}

/// One asynchronous analysis run over a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub job_id: Uuid,
    pub transcript_id: Uuid,
    pub status: JobStatus,
    pub summary: Option<String>,
    pub takeaways: Vec<String>,
    pub fact_checks: Vec<FactCheck>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl AnalysisJob {
    /// Create a pending job for a transcript with a fresh id.
    pub fn new(transcript_id: Uuid) -> Self {
        Self {
            job_id: new_entity_id(),
            transcript_id,
            status: JobStatus::Pending,
            summary: None,
            takeaways: Vec::new(),
            fact_checks: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    /// Queue message announcing this job.
    pub fn message(&self) -> JobMessage {
        JobMessage {
            job_id: self.job_id,
            transcript_id: self.transcript_id,
            created_at: self.created_at,
        }
    }

    /// Stored results. Empty until the job completes.
    pub fn results(&self) -> AnalysisResults {
        AnalysisResults {
            summary: self.summary.clone(),
            takeaways: self.takeaways.clone(),
            fact_checks: self.fact_checks.clone(),
        }
    }

    /// Move the job into `Processing`.
    ///
    /// A job already processing is left alone so a redelivered message can
    /// resume it.
    pub fn begin_processing(&mut self) -> Result<TransitionOutcome, StorageError> {
        self.check_transition(JobStatus::Processing)?;
        if self.status == JobStatus::Processing {
            return Ok(TransitionOutcome::Unchanged);
        }
        self.status = JobStatus::Processing;
        Ok(TransitionOutcome::Applied)
    }

    /// Store results and move the job into `Completed`.
    pub fn complete(
        &mut self,
        results: AnalysisResults,
        at: Timestamp,
    ) -> Result<TransitionOutcome, StorageError> {
        self.check_transition(JobStatus::Completed)?;
        if self.status == JobStatus::Completed {
            return Ok(TransitionOutcome::Unchanged);
        }
        self.status = JobStatus::Completed;
        self.summary = results.summary;
        self.takeaways = results.takeaways;
        self.fact_checks = results.fact_checks;
        self.completed_at.get_or_insert(at);
        Ok(TransitionOutcome::Applied)
    }

    /// Move the job into `Failed` with an error message.
    ///
    /// Failing an already failed job is a no-op and keeps the first message.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        at: Timestamp,
    ) -> Result<TransitionOutcome, StorageError> {
        self.check_transition(JobStatus::Failed)?;
        if self.status == JobStatus::Failed {
            return Ok(TransitionOutcome::Unchanged);
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at.get_or_insert(at);
        Ok(TransitionOutcome::Applied)
    }

    fn check_transition(&self, next: JobStatus) -> Result<(), StorageError> {
        if self.status == next || self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(StorageError::InvalidTransition {
                job_id: self.job_id,
                from: self.status,
                to: next,
            })
        }
    }
}

// ============================================================================
// QUEUE MESSAGE
// ============================================================================

/// Payload published to the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: Uuid,
    pub transcript_id: Uuid,
    pub created_at: Timestamp,
}

impl JobMessage {
    /// Encode as the JSON wire format.
    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::MalformedMessage {
            reason: e.to_string(),
        })
    }

    /// Decode from the JSON wire format.
    pub fn from_json(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str(payload).map_err(|e| QueueError::MalformedMessage {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> AnalysisResults {
        AnalysisResults {
            summary: Some("A short summary of the episode.".to_string()),
            takeaways: vec!["Sleep matters.".to_string()],
            fact_checks: vec![FactCheck::unverifiable("The moon is made of cheese", "No search results found")],
        }
    }

    #[test]
    fn test_new_job_is_pending() {
        let transcript_id = Uuid::now_v7();
        let job = AnalysisJob::new(transcript_id);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.transcript_id, transcript_id);
        assert!(job.completed_at.is_none());
        assert!(job.error_message.is_none());
        assert!(job.takeaways.is_empty());
    }

    #[test]
    fn test_happy_path_lifecycle() {
        let mut job = AnalysisJob::new(Uuid::now_v7());
        assert_eq!(job.begin_processing(), Ok(TransitionOutcome::Applied));
        let at = Utc::now();
        assert_eq!(
            job.complete(sample_results(), at),
            Ok(TransitionOutcome::Applied)
        );
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(at));
        assert_eq!(job.takeaways.len(), 1);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut job = AnalysisJob::new(Uuid::now_v7());
        let err = job.complete(sample_results(), Utc::now()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidTransition { .. }));
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_fail_is_idempotent() {
        let mut job = AnalysisJob::new(Uuid::now_v7());
        job.begin_processing().unwrap();
        let first = Utc::now();
        assert_eq!(job.fail("boom", first), Ok(TransitionOutcome::Applied));
        assert_eq!(
            job.fail("boom", Utc::now()),
            Ok(TransitionOutcome::Unchanged)
        );
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert_eq!(job.completed_at, Some(first));
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let mut job = AnalysisJob::new(Uuid::now_v7());
        job.begin_processing().unwrap();
        job.complete(sample_results(), Utc::now()).unwrap();

        assert!(job.fail("late failure", Utc::now()).is_err());
        assert!(job.begin_processing().is_err());
        assert_eq!(
            job.complete(AnalysisResults::default(), Utc::now()),
            Ok(TransitionOutcome::Unchanged)
        );
        assert_eq!(job.takeaways.len(), 1);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_pending_job_can_fail_directly() {
        let mut job = AnalysisJob::new(Uuid::now_v7());
        assert_eq!(
            job.fail("Failed to queue analysis job", Utc::now()),
            Ok(TransitionOutcome::Applied)
        );
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_fact_check_clamps_confidence() {
        let check = FactCheck::new("claim", Verdict::True, 1.7, "evidence", vec![]);
        assert_eq!(check.confidence, 1.0);
        let check = FactCheck::new("claim", Verdict::False, -0.2, "evidence", vec![]);
        assert_eq!(check.confidence, 0.0);
        let check = FactCheck::new("claim", Verdict::False, f64::NAN, "evidence", vec![]);
        assert_eq!(check.confidence, 0.0);
    }

    #[test]
    fn test_verdict_tally() {
        let checks = vec![
            FactCheck::new("a", Verdict::True, 0.9, "e", vec![]),
            FactCheck::new("b", Verdict::True, 0.8, "e", vec![]),
            FactCheck::unverifiable("c", "No search results found"),
        ];
        let tally = VerdictTally::from_checks(&checks);
        assert_eq!(tally.true_count, 2);
        assert_eq!(tally.unverifiable_count, 1);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_job_message_wire_format() {
        let job = AnalysisJob::new(Uuid::now_v7());
        let json = job.message().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("job_id").is_some());
        assert!(value.get("transcript_id").is_some());
        assert!(value.get("created_at").is_some());
        assert_eq!(JobMessage::from_json(&json).unwrap(), job.message());
    }

    #[test]
    fn test_job_message_rejects_garbage() {
        let err = JobMessage::from_json("{\"job_id\": 7}").unwrap_err();
        assert!(matches!(err, QueueError::MalformedMessage { .. }));
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
