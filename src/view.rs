use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::types::Approval;

/// Identifier of the synthetic stage that covers the whole build.
pub const ALL_STAGE_ID: &str = "ALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
    Aborted,
    PausedPendingInput,
    Unstable,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
            Self::PausedPendingInput => "PAUSED_PENDING_INPUT",
            Self::Unstable => "UNSTABLE",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical phase of a build as presented to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Boundary node id, or [`ALL_STAGE_ID`]
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub executed: bool,
    pub start_time_millis: i64,
    pub duration_millis: i64,
    pub logs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<Approval>,
}

impl Stage {
    pub fn is_all(&self) -> bool {
        self.id == ALL_STAGE_ID
    }
}

/// Stage-by-stage rendering of a single build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildView {
    pub job_name: String,
    pub job_full_name: String,
    pub build_number: u64,
    pub build_url: String,
    pub overall_status: StageStatus,
    pub running: bool,
    pub stages: Vec<Stage>,
}

impl BuildView {
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    /// Stages that are currently blocked on an approval.
    pub fn pending_approvals(&self) -> impl Iterator<Item = (&Stage, &Approval)> {
        self.stages
            .iter()
            .filter_map(|stage| stage.approval.as_ref().map(|approval| (stage, approval)))
    }
}
