use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::sources::BoundParameters;
use crate::engine::types::{Approval, BuildMetadata, ExecutionNode, StageSpan};

/// Everything the store knows about one build, as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSnapshot {
    pub metadata: BuildMetadata,
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    /// Whole-build console output
    #[serde(default)]
    pub build_log: String,
    #[serde(default)]
    pub pending_approvals: Vec<Approval>,
    /// Stage structure recorded by an upstream graph analysis, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_spans: Option<Vec<StageSpan>>,
    /// Approvals that have left the pending list, oldest first
    #[serde(default)]
    pub history: Vec<ApprovalRecord>,
}

/// Execution node with its log text stored inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub node: ExecutionNode,
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_id: String,
    pub outcome: ApprovalOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApprovalOutcome {
    Submitted { parameters: BoundParameters },
    Aborted,
}
