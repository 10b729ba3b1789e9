//! Generation request inputs, task outcomes, and their validation rules.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::status::JobStatus;

/// Maximum accepted prompt length, in characters.
pub const MAX_PROMPT_LEN: u64 = 4000;

/// Maximum accepted feedback text length, in characters.
pub const MAX_FEEDBACK_LEN: u64 = 2000;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Optional style hints forwarded verbatim to the generation API.
///
/// Every field is free text chosen by the client's prompt builder
/// (`"ai"` conventionally means "let the model decide").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrangement: Option<String>,
}

/// Body of a job creation request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJob {
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,
    #[serde(default)]
    pub flags: Option<GenerationFlags>,
}

impl CreateJob {
    /// Check the request and return the prompt with surrounding whitespace
    /// removed.
    pub fn validated_prompt(&self) -> Result<&str, CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid job request: {e}")))?;
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation("Prompt must not be blank".into()));
        }
        Ok(prompt)
    }
}

/// Kind of feedback a user can leave on a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Positive => "positive",
            FeedbackKind::Negative => "negative",
        }
    }
}

/// Body of a feedback request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitFeedback {
    pub kind: FeedbackKind,
    #[validate(length(max = 2000))]
    pub text: Option<String>,
}

impl SubmitFeedback {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid feedback: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Terminal outcome of a generation task. At most one is ever recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Output(String),
    Error(String),
    Canceled,
}

impl TaskOutcome {
    /// Rebuild the outcome from the three persisted outcome columns.
    ///
    /// Returns `None` while the task is still running. If the columns were
    /// ever inconsistent, `output` wins over `error`, which wins over
    /// `canceled`.
    pub fn from_columns(
        output: Option<String>,
        error: Option<String>,
        canceled: bool,
    ) -> Option<Self> {
        match (output, error) {
            (Some(output), _) => Some(TaskOutcome::Output(output)),
            (None, Some(error)) => Some(TaskOutcome::Error(error)),
            (None, None) if canceled => Some(TaskOutcome::Canceled),
            (None, None) => None,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            TaskOutcome::Output(_) => JobStatus::Finished,
            TaskOutcome::Error(_) => JobStatus::Error,
            TaskOutcome::Canceled => JobStatus::Canceled,
        }
    }
}

/// Status of a task given its (possibly absent) outcome.
pub fn status_of(outcome: Option<&TaskOutcome>) -> JobStatus {
    outcome.map_or(JobStatus::Running, TaskOutcome::status)
}
