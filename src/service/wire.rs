use serde::{Deserialize, Serialize};

use crate::problem::ProblemPayload;
use crate::scheduler::JobKind;
use crate::store::JobRecord;

/// The `type` object of a submitted job, e.g.
/// `{"id": "tsk_cgrv", "label": "Classical gravitation"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindTag {
    pub id: JobKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One job as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: KindTag,
    pub problem: ProblemPayload,
}

impl JobRequest {
    pub fn classical_gravitation(id: impl Into<String>, problem: ProblemPayload) -> Self {
        Self {
            id: id.into(),
            kind: KindTag {
                id: JobKind::ClassicalGravitation,
                label: Some("Classical gravitation".to_string()),
            },
            problem,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub job_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<Rejection>,
}

/// Synchronous answer to a retrieve request. `status` is false for a missing
/// job as well as for a failed one.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub status: bool,
    pub record: Option<JobRecord>,
}
