use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageViewError {
    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("Transient read error: {0}")]
    TransientRead(String),

    #[error("Approval not found: {0}")]
    ApprovalNotFound(String),

    #[error("Cannot coerce parameter '{parameter}': {reason}")]
    Coercion { parameter: String, reason: String },

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid build reference '{0}' (expected <job>#<number>)")]
    InvalidBuildRef(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageViewError {
    /// Whether a read path should degrade instead of surfacing this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRead(_))
    }
}

pub type Result<T> = std::result::Result<T, StageViewError>;
