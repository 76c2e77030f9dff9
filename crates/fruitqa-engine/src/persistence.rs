//! Hand-off of a finalized submission to the persistence collaborator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::session::Submission;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("storage rejected the submission: {0}")]
    Rejected(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// The user finalizing a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub title: String,
    pub version: String,
}

/// What the collaborator receives: the submission with template and user
/// metadata alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizePayload {
    #[serde(flatten)]
    pub submission: Submission,
    pub template: TemplateRef,
    pub user: Submitter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    #[default]
    Ok,
    Warn,
    Fail,
}

impl HealthStatus {
    /// `FAIL` and `WARN` are recognized case-insensitively; anything else is `OK`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FAIL" => HealthStatus::Fail,
            "WARN" => HealthStatus::Warn,
            _ => HealthStatus::Ok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub ok: bool,
    pub submission_id: String,
    pub health_status: HealthStatus,
    #[serde(default)]
    pub counts: Map<String, Value>,
}

impl FinalizeOutcome {
    /// Outcome whose health is read from `counts.health_status`.
    pub fn from_counts(submission_id: impl Into<String>, counts: Map<String, Value>) -> Self {
        let health_status = counts
            .get("health_status")
            .and_then(Value::as_str)
            .map(HealthStatus::parse)
            .unwrap_or_default();
        Self {
            ok: true,
            submission_id: submission_id.into(),
            health_status,
            counts,
        }
    }
}

/// Storage of finalized submissions.
pub trait Persistence {
    fn finalize(&mut self, payload: &FinalizePayload) -> Result<FinalizeOutcome, PersistenceError>;
}
