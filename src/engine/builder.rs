use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};

use crate::build_ref::BuildRef;
use crate::error::{Result, StageViewError};
use crate::view::{BuildView, Stage, ALL_STAGE_ID};

use super::cache::{StageLayout, ViewCache};
use super::correlator::{correlate, Correlation};
use super::graph::NodeArena;
use super::logs::LogAggregator;
use super::segmenter::{select_segmenter, Segment, SegmentationMode, Segmenter};
use super::sources::{ApprovalRegistry, BuildMetadataProvider, GraphReader, StageGraphAnalysis};
use super::status::{
    is_executed, resolve_all_stage_status, resolve_overall_status, resolve_stage_status,
};
use super::types::{Approval, BuildMetadata};

/// Builds stage views of a build from its execution graph and pending
/// approvals.
///
/// Every call is a side-effect-free snapshot read; calls may run concurrently
/// with each other and with approval submissions.
pub struct StageViewBuilder {
    graph: Arc<dyn GraphReader>,
    approvals: Arc<dyn ApprovalRegistry>,
    metadata: Arc<dyn BuildMetadataProvider>,
    segmenter: Arc<dyn Segmenter>,
    logs: LogAggregator,
}

impl StageViewBuilder {
    pub fn new(
        graph: Arc<dyn GraphReader>,
        approvals: Arc<dyn ApprovalRegistry>,
        metadata: Arc<dyn BuildMetadataProvider>,
        segmenter: Arc<dyn Segmenter>,
        logs: LogAggregator,
    ) -> Self {
        Self {
            graph,
            approvals,
            metadata,
            segmenter,
            logs,
        }
    }

    /// Creates a builder, probing `analysis` once to pick the segmentation
    /// strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if delegated segmentation is forced without an analysis.
    pub async fn probe(
        graph: Arc<dyn GraphReader>,
        approvals: Arc<dyn ApprovalRegistry>,
        metadata: Arc<dyn BuildMetadataProvider>,
        analysis: Option<Arc<dyn StageGraphAnalysis>>,
        mode: SegmentationMode,
        logs: LogAggregator,
    ) -> Result<Self> {
        let segmenter = select_segmenter(mode, analysis).await?;
        Ok(Self::new(graph, approvals, metadata, segmenter, logs))
    }

    pub fn segmenter_name(&self) -> &'static str {
        self.segmenter.name()
    }

    /// Full view: the ALL stage first, then every stage in chronological
    /// order, with logs.
    ///
    /// # Errors
    ///
    /// Only `BuildNotFound` is returned; any other read failure degrades the
    /// view instead.
    pub async fn full_stage_view(&self, build: &BuildRef) -> Result<BuildView> {
        let metadata = self.read_metadata(build).await?;
        let layout = self.layout(build, true).await?;
        let approvals = self.pending_approvals(build).await?;

        Ok(Self::assemble(&metadata, &layout, approvals, true))
    }

    /// Same as [`Self::full_stage_view`], reusing segmentation and logs from
    /// `cache` while the build's graph version is unchanged.
    ///
    /// # Errors
    ///
    /// Only `BuildNotFound` is returned.
    pub async fn full_stage_view_cached(
        &self,
        cache: &ViewCache,
        build: &BuildRef,
    ) -> Result<BuildView> {
        let metadata = self.read_metadata(build).await?;

        let layout = match self.graph.graph_version(build).await {
            Ok(version) => {
                if let Some(layout) = cache.get(build, version) {
                    layout
                } else {
                    let layout = Arc::new(self.layout(build, true).await?);
                    if layout.degraded {
                        debug!("Not caching partial layout of {build} at graph version {version}");
                    } else {
                        cache.insert(build, version, Arc::clone(&layout));
                    }
                    layout
                }
            }
            Err(StageViewError::BuildNotFound(id)) => return Err(StageViewError::BuildNotFound(id)),
            Err(e) => {
                warn!("Graph version of {build} unavailable, bypassing cache: {e}");
                Arc::new(self.layout(build, true).await?)
            }
        };

        let approvals = self.pending_approvals(build).await?;
        Ok(Self::assemble(&metadata, &layout, approvals, true))
    }

    /// Pending-approval view: only the stages currently waiting for input,
    /// without logs.
    ///
    /// # Errors
    ///
    /// Only `BuildNotFound` is returned.
    pub async fn stage_view(&self, build: &BuildRef) -> Result<BuildView> {
        let metadata = self.read_metadata(build).await?;
        let layout = self.layout(build, false).await?;
        let approvals = self.pending_approvals(build).await?;

        let mut view = Self::assemble(&metadata, &layout, approvals, false);
        view.stages.retain(|stage| stage.approval.is_some());
        Ok(view)
    }

    async fn read_metadata(&self, build: &BuildRef) -> Result<BuildMetadata> {
        match self.metadata.metadata(build).await {
            Ok(metadata) => Ok(metadata),
            Err(StageViewError::BuildNotFound(id)) => Err(StageViewError::BuildNotFound(id)),
            Err(e) => {
                warn!("Metadata of {build} unavailable, using placeholders: {e}");
                Ok(BuildMetadata {
                    job_full_name: build.job_full_name.clone(),
                    number: build.number,
                    url: String::new(),
                    running: false,
                    result: None,
                    start_time_millis: 0,
                    duration_millis: None,
                })
            }
        }
    }

    async fn layout(&self, build: &BuildRef, with_logs: bool) -> Result<StageLayout> {
        let mut degraded = false;

        let nodes = match self.graph.list_nodes(build).await {
            Ok(nodes) => nodes,
            Err(StageViewError::BuildNotFound(id)) => return Err(StageViewError::BuildNotFound(id)),
            Err(e) => {
                warn!("Execution graph of {build} unavailable: {e}");
                degraded = true;
                Vec::new()
            }
        };

        let arena = NodeArena::new(nodes);
        let segments = match self.segmenter.segment(build, &arena).await {
            Ok(segments) => segments,
            Err(StageViewError::BuildNotFound(id)) => return Err(StageViewError::BuildNotFound(id)),
            Err(e) => {
                warn!("Segmentation of {build} failed, showing no stages: {e}");
                degraded = true;
                Vec::new()
            }
        };
        let segments: Vec<Segment> = segments
            .into_iter()
            .filter(|segment| {
                let reserved = segment.id == ALL_STAGE_ID;
                if reserved {
                    warn!(
                        "{}",
                        StageViewError::InvariantViolation(format!(
                            "stage id {ALL_STAGE_ID} collides with the synthetic stage in {build}"
                        ))
                    );
                }
                !reserved
            })
            .collect();

        let (logs, build_log) = if with_logs {
            let graph = self.graph.as_ref();
            let stage_logs = join_all(
                segments
                    .iter()
                    .map(|segment| self.logs.segment_log(graph, build, &arena, segment)),
            );
            let build_log = self.logs.build_log(graph, build);
            let (stage_logs, build_log) = futures::join!(stage_logs, build_log);

            degraded |= !build_log.complete || stage_logs.iter().any(|log| !log.complete);
            (
                stage_logs.into_iter().map(|log| log.text).collect(),
                build_log.text,
            )
        } else {
            (vec![String::new(); segments.len()], String::new())
        };

        debug!(
            "Laid out {} stages over {} nodes for {build}",
            segments.len(),
            arena.len()
        );

        Ok(StageLayout {
            arena,
            segments,
            logs,
            build_log,
            degraded,
        })
    }

    async fn pending_approvals(&self, build: &BuildRef) -> Result<Vec<Approval>> {
        match self.approvals.list_pending(build).await {
            Ok(approvals) => Ok(approvals),
            Err(StageViewError::BuildNotFound(id)) => Err(StageViewError::BuildNotFound(id)),
            Err(e) => {
                warn!("Pending approvals of {build} unavailable: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn assemble(
        metadata: &BuildMetadata,
        layout: &StageLayout,
        approvals: Vec<Approval>,
        with_logs: bool,
    ) -> BuildView {
        let Correlation { by_segment, all } = correlate(&layout.arena, &layout.segments, approvals);
        let overall_status = resolve_overall_status(metadata);
        let build_end = build_end_millis(metadata);

        let mut stages = Vec::with_capacity(layout.segments.len() + 1);

        let all_status = resolve_all_stage_status(overall_status, all.is_some());
        stages.push(Stage {
            id: ALL_STAGE_ID.to_string(),
            name: ALL_STAGE_ID.to_string(),
            status: all_status,
            executed: is_executed(all_status),
            start_time_millis: metadata.start_time_millis,
            duration_millis: build_end.saturating_sub(metadata.start_time_millis).max(0),
            logs: if with_logs {
                layout.build_log.clone()
            } else {
                String::new()
            },
            approval: all,
        });

        let starts: Vec<i64> = layout
            .segments
            .iter()
            .map(|segment| {
                layout
                    .arena
                    .get(segment.boundary)
                    .map_or(metadata.start_time_millis, |node| node.start_time_millis)
            })
            .collect();

        for (index, (segment, approval)) in layout.segments.iter().zip(by_segment).enumerate() {
            let status = resolve_stage_status(&layout.arena, segment, approval.is_some());
            let start = starts[index];
            let end = starts.get(index + 1).copied().unwrap_or(build_end);

            stages.push(Stage {
                id: segment.id.clone(),
                name: segment.name.clone(),
                status,
                executed: is_executed(status),
                start_time_millis: start,
                duration_millis: end.saturating_sub(start).max(0),
                logs: layout.logs.get(index).cloned().unwrap_or_default(),
                approval,
            });
        }

        info!(
            "Built view of {}#{} with {} stages ({overall_status})",
            metadata.job_full_name,
            metadata.number,
            stages.len()
        );

        BuildView {
            job_name: metadata.job_name().to_string(),
            job_full_name: metadata.job_full_name.clone(),
            build_number: metadata.number,
            build_url: metadata.url.clone(),
            overall_status,
            running: metadata.running,
            stages,
        }
    }
}

/// End of the build: now while running, otherwise start plus duration.
fn build_end_millis(metadata: &BuildMetadata) -> i64 {
    if metadata.running {
        return Utc::now().timestamp_millis();
    }
    metadata
        .start_time_millis
        .saturating_add(metadata.duration_millis.unwrap_or(0))
}
