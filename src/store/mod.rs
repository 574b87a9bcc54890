mod snapshot;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use tokio::sync::RwLock;

use crate::build_ref::BuildRef;
use crate::engine::sources::{
    ApprovalRegistry, BoundParameters, BuildMetadataProvider, GraphReader, StageGraphAnalysis,
};
use crate::engine::types::{Approval, BuildMetadata, ExecutionNode, StageSpan};
use crate::error::{Result, StageViewError};

pub use snapshot::{ApprovalOutcome, ApprovalRecord, BuildSnapshot, SnapshotNode};

/// File-backed store of build snapshots.
///
/// Serves every collaborator the engine consumes. Snapshots live under
/// `{root}/{job-slug}/{number}.json` (e.g. `team/api#7` →
/// `team-api/7.json`) and are loaded lazily into memory on first access.
///
/// Approval resolution and cancellation happen under the store's write lock
/// and are persisted before they become visible, so each pending approval
/// leaves the store exactly once.
pub struct BuildStore {
    root: PathBuf,
    builds: RwLock<HashMap<BuildRef, BuildSnapshot>>,
    analysis_enabled: bool,
}

impl BuildStore {
    /// Creates a store rooted at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding per-job snapshot directories
    /// * `analysis_enabled` - Whether recorded stage spans may serve as delegated segmentation
    pub fn new(root: impl Into<PathBuf>, analysis_enabled: bool) -> Self {
        let root = root.into();
        info!("Build store at: {}", root.display());
        Self {
            root,
            builds: RwLock::new(HashMap::new()),
            analysis_enabled,
        }
    }

    /// Platform-specific default location:
    /// - Linux: `~/.local/share/stageview/builds`
    /// - macOS: `~/Library/Application Support/stageview/builds`
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined.
    pub fn default_root() -> Result<PathBuf> {
        Ok(dirs::data_dir()
            .ok_or_else(|| StageViewError::Config("No data directory found".into()))?
            .join("stageview")
            .join("builds"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self, build: &BuildRef) -> PathBuf {
        self.root
            .join(build.job_slug())
            .join(format!("{}.json", build.number))
    }

    /// Stores a snapshot for `build`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn put(&self, build: &BuildRef, snapshot: BuildSnapshot) -> Result<()> {
        let mut builds = self.builds.write().await;
        self.persist(build, &snapshot).await?;
        builds.insert(build.clone(), snapshot);
        Ok(())
    }

    /// Resolution history of a build's approvals.
    ///
    /// # Errors
    ///
    /// Returns `BuildNotFound` if the build has no snapshot.
    pub async fn history(&self, build: &BuildRef) -> Result<Vec<ApprovalRecord>> {
        self.read(build, |snapshot| snapshot.history.clone()).await
    }

    async fn read<T>(&self, build: &BuildRef, f: impl FnOnce(&BuildSnapshot) -> T) -> Result<T> {
        self.ensure_loaded(build).await?;
        let builds = self.builds.read().await;
        builds
            .get(build)
            .map(f)
            .ok_or_else(|| StageViewError::BuildNotFound(build.to_string()))
    }

    async fn ensure_loaded(&self, build: &BuildRef) -> Result<()> {
        if self.builds.read().await.contains_key(build) {
            return Ok(());
        }

        let snapshot = self.load(build).await?;
        self.builds
            .write()
            .await
            .entry(build.clone())
            .or_insert(snapshot);
        Ok(())
    }

    async fn load(&self, build: &BuildRef) -> Result<BuildSnapshot> {
        let path = self.snapshot_path(build);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StageViewError::BuildNotFound(build.to_string()));
            }
            Err(e) => {
                return Err(StageViewError::TransientRead(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        let snapshot = serde_json::from_str(&content).map_err(|e| {
            StageViewError::TransientRead(format!("cannot parse {}: {e}", path.display()))
        })?;
        debug!("Loaded snapshot of {build} from: {}", path.display());
        Ok(snapshot)
    }

    async fn persist(&self, build: &BuildRef, snapshot: &BuildSnapshot) -> Result<()> {
        let path = self.snapshot_path(build);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&path, content).await?;
        debug!("Saved snapshot of {build} to: {}", path.display());
        Ok(())
    }

    /// Moves a pending approval into the history, exactly once.
    async fn settle(&self, build: &BuildRef, approval_id: &str, outcome: ApprovalOutcome) -> Result<bool> {
        self.ensure_loaded(build).await?;

        let mut builds = self.builds.write().await;
        let current = builds
            .get(build)
            .ok_or_else(|| StageViewError::BuildNotFound(build.to_string()))?;

        let Some(position) = current
            .pending_approvals
            .iter()
            .position(|approval| approval.id == approval_id)
        else {
            return Ok(false);
        };

        let mut updated = current.clone();
        updated.pending_approvals.remove(position);
        updated.history.push(ApprovalRecord {
            approval_id: approval_id.to_string(),
            outcome,
            at: Utc::now(),
        });

        self.persist(build, &updated).await?;
        builds.insert(build.clone(), updated);
        Ok(true)
    }
}

#[async_trait]
impl GraphReader for BuildStore {
    async fn list_nodes(&self, build: &BuildRef) -> Result<Vec<ExecutionNode>> {
        self.read(build, |snapshot| {
            snapshot
                .nodes
                .iter()
                .map(|entry| ExecutionNode {
                    log_handle: (!entry.log.is_empty()).then(|| entry.node.id.clone()),
                    ..entry.node.clone()
                })
                .collect()
        })
        .await
    }

    async fn read_log(&self, build: &BuildRef, handle: &str) -> Result<String> {
        self.read(build, |snapshot| {
            snapshot
                .nodes
                .iter()
                .find(|entry| entry.node.id == handle)
                .map(|entry| entry.log.clone())
        })
        .await?
        .ok_or_else(|| StageViewError::TransientRead(format!("no log for node {handle} in {build}")))
    }

    async fn read_build_log(&self, build: &BuildRef) -> Result<String> {
        self.read(build, |snapshot| snapshot.build_log.clone()).await
    }

    async fn graph_version(&self, build: &BuildRef) -> Result<u64> {
        self.read(build, |snapshot| {
            u64::try_from(snapshot.nodes.len()).unwrap_or(u64::MAX)
        })
        .await
    }
}

#[async_trait]
impl ApprovalRegistry for BuildStore {
    async fn list_pending(&self, build: &BuildRef) -> Result<Vec<Approval>> {
        self.read(build, |snapshot| snapshot.pending_approvals.clone())
            .await
    }

    async fn resolve(
        &self,
        build: &BuildRef,
        approval_id: &str,
        parameters: &BoundParameters,
    ) -> Result<bool> {
        self.settle(
            build,
            approval_id,
            ApprovalOutcome::Submitted {
                parameters: parameters.clone(),
            },
        )
        .await
    }

    async fn cancel(&self, build: &BuildRef, approval_id: &str) -> Result<bool> {
        self.settle(build, approval_id, ApprovalOutcome::Aborted)
            .await
    }
}

#[async_trait]
impl BuildMetadataProvider for BuildStore {
    async fn metadata(&self, build: &BuildRef) -> Result<BuildMetadata> {
        self.read(build, |snapshot| snapshot.metadata.clone()).await
    }
}

#[async_trait]
impl StageGraphAnalysis for BuildStore {
    async fn probe(&self) -> bool {
        self.analysis_enabled
    }

    async fn analyze(&self, build: &BuildRef, _nodes: &[ExecutionNode]) -> Result<Vec<StageSpan>> {
        self.read(build, |snapshot| snapshot.stage_spans.clone())
            .await?
            .ok_or_else(|| {
                StageViewError::TransientRead(format!("no stage analysis recorded for {build}"))
            })
    }
}
