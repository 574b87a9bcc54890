use serde::{Deserialize, Serialize};

use crate::view::StageStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Marks the start of a logical stage
    Boundary,
    /// A regular step (shell command, checkout, ...)
    Step,
    Other,
}

/// One recorded step/action in a build's execution history.
///
/// Nodes are append-only: once observed they never change, although a running
/// build keeps adding new ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionNode {
    /// Unique per build
    pub id: String,
    pub kind: NodeKind,
    /// Stage label, only meaningful on boundary nodes
    #[serde(default)]
    pub label: Option<String>,
    /// Ordered parent ids; the first one is the primary lineage
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub error_present: bool,
    #[serde(default)]
    pub start_time_millis: i64,
    /// Opaque handle accepted by `GraphReader::read_log`
    #[serde(default)]
    pub log_handle: Option<String>,
}

impl ExecutionNode {
    /// The stage label if this node opens a stage.
    ///
    /// Boundary nodes without a (non-empty) label do not open a stage.
    pub fn stage_label(&self) -> Option<&str> {
        match (self.kind, self.label.as_deref()) {
            (NodeKind::Boundary, Some(label)) if !label.trim().is_empty() => Some(label),
            _ => None,
        }
    }

    pub fn is_stage_boundary(&self) -> bool {
        self.stage_label().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Text,
    Password,
    Boolean,
    Choice,
    /// Any type the upstream catalog knows but this engine treats as text
    #[serde(other)]
    Other,
}

/// A bound or default parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Boolean(bool),
    Text(String),
}

impl ParameterValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChoice {
    pub key: String,
    pub display: String,
}

/// A typed input an approval asks for before execution resumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredParameter {
    pub name: String,
    pub declared_type: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: Option<ParameterValue>,
    #[serde(default)]
    pub choices: Vec<ParameterChoice>,
    #[serde(default)]
    pub required: bool,
}

/// A pause point awaiting externally supplied parameter values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    /// Opaque token identifying this approval
    pub id: String,
    pub message: String,
    /// Who may respond; `None` means anyone
    #[serde(default)]
    pub submitter_pattern: Option<String>,
    #[serde(default = "default_proceed_label")]
    pub proceed_label: String,
    #[serde(default)]
    pub parameters: Vec<RequiredParameter>,
    /// Execution node that raised the approval
    pub origin_node_id: String,
}

fn default_proceed_label() -> String {
    "Proceed".to_string()
}

/// Job and build identity plus lifecycle facts for one build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub job_full_name: String,
    pub number: u64,
    pub url: String,
    pub running: bool,
    /// Terminal result as reported by the build system (e.g. "SUCCESS")
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub start_time_millis: i64,
    /// Total duration; `None` while running
    #[serde(default)]
    pub duration_millis: Option<i64>,
}

impl BuildMetadata {
    pub fn job_name(&self) -> &str {
        self.job_full_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.job_full_name)
    }
}

/// A stage as reported by a delegated graph-analysis extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpan {
    /// Id of the node that opens the stage
    pub boundary_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Member node ids, boundary included
    #[serde(default)]
    pub node_ids: Vec<String>,
    /// Stage-level status computed by the analysis, when it knows better
    #[serde(default)]
    pub status: Option<StageStatus>,
}
