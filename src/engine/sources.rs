//! Collaborators the engine consumes.
//!
//! Implementations are expected to be thread-safe, single authoritative
//! stores that may change between (and during) calls. Calls should be bounded
//! or fail fast with `StageViewError::TransientRead`; the engine never retries.

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::build_ref::BuildRef;
use crate::error::Result;

use super::types::{Approval, BuildMetadata, ExecutionNode, ParameterValue, StageSpan};

/// Parameter values bound for one approval, in declaration order.
pub type BoundParameters = IndexMap<String, ParameterValue>;

#[async_trait]
pub trait GraphReader: Send + Sync {
    /// Chronologically ordered snapshot of the build's execution nodes.
    async fn list_nodes(&self, build: &BuildRef) -> Result<Vec<ExecutionNode>>;

    /// Currently available text for one node's log handle.
    async fn read_log(&self, build: &BuildRef, handle: &str) -> Result<String>;

    /// Build-level aggregate log, including output no node owns.
    async fn read_build_log(&self, build: &BuildRef) -> Result<String>;

    /// Version of the graph; must change whenever nodes are appended.
    async fn graph_version(&self, build: &BuildRef) -> Result<u64> {
        let nodes = self.list_nodes(build).await?;
        Ok(u64::try_from(nodes.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
pub trait ApprovalRegistry: Send + Sync {
    /// Approvals still waiting for input, in registry order.
    async fn list_pending(&self, build: &BuildRef) -> Result<Vec<Approval>>;

    /// Resolves an approval. Only one call per id may ever return `Ok(true)`.
    async fn resolve(
        &self,
        build: &BuildRef,
        approval_id: &str,
        parameters: &BoundParameters,
    ) -> Result<bool>;

    /// Cancels an approval. Only one call per id may ever return `Ok(true)`.
    async fn cancel(&self, build: &BuildRef, approval_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait BuildMetadataProvider: Send + Sync {
    async fn metadata(&self, build: &BuildRef) -> Result<BuildMetadata>;
}

/// Optional extension that knows the precise stage structure of a build.
#[async_trait]
pub trait StageGraphAnalysis: Send + Sync {
    /// Whether the extension can serve requests at all.
    async fn probe(&self) -> bool;

    async fn analyze(&self, build: &BuildRef, nodes: &[ExecutionNode]) -> Result<Vec<StageSpan>>;
}
