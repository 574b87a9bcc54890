use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::build_ref::BuildRef;
use crate::error::{Result, StageViewError};
use crate::view::StageStatus;

use super::graph::{NodeArena, NodeIdx};
use super::sources::StageGraphAnalysis;

/// Node range owned by one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Arena index of the node that opened the stage
    pub boundary: NodeIdx,
    /// Stage id (the boundary node id)
    pub id: String,
    pub name: String,
    /// Member indices in encounter order, boundary first
    pub members: Vec<NodeIdx>,
    /// Status reported by a delegated analysis, if any
    pub status_hint: Option<StageStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMode {
    /// Use the delegated analysis when it answers the availability probe
    #[default]
    Auto,
    /// Always walk the graph manually
    Walk,
    /// Always use the delegated analysis
    Delegated,
}

#[async_trait]
pub trait Segmenter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Splits the graph into chronologically ordered segments.
    ///
    /// Failures are returned as-is; the caller decides whether to degrade.
    async fn segment(&self, build: &BuildRef, arena: &NodeArena) -> Result<Vec<Segment>>;
}

/// Picks the segmentation strategy once, up front.
pub async fn select_segmenter(
    mode: SegmentationMode,
    analysis: Option<Arc<dyn StageGraphAnalysis>>,
) -> Result<Arc<dyn Segmenter>> {
    let segmenter: Arc<dyn Segmenter> = match (mode, analysis) {
        (SegmentationMode::Walk, _) => Arc::new(GraphWalkSegmenter),
        (SegmentationMode::Delegated, Some(analysis)) => Arc::new(DelegatedSegmenter::new(analysis)),
        (SegmentationMode::Delegated, None) => {
            return Err(StageViewError::Config(
                "delegated segmentation requested but no stage analysis is configured".into(),
            ));
        }
        (SegmentationMode::Auto, Some(analysis)) if analysis.probe().await => {
            Arc::new(DelegatedSegmenter::new(analysis))
        }
        (SegmentationMode::Auto, _) => Arc::new(GraphWalkSegmenter),
    };

    info!("Using {} segmentation", segmenter.name());
    Ok(segmenter)
}

/// Manual forward walk: every labeled boundary node opens a new segment that
/// runs until the next one.
pub struct GraphWalkSegmenter;

impl GraphWalkSegmenter {
    pub fn walk(arena: &NodeArena) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();

        for (idx, node) in arena.nodes().iter().enumerate() {
            if let Some(label) = node.stage_label() {
                segments.push(Segment {
                    boundary: idx,
                    id: node.id.clone(),
                    name: label.to_string(),
                    members: vec![idx],
                    status_hint: None,
                });
            } else if let Some(current) = segments.last_mut() {
                current.members.push(idx);
            }
        }

        debug!(
            "Walked {} nodes into {} segments",
            arena.len(),
            segments.len()
        );
        segments
    }
}

#[async_trait]
impl Segmenter for GraphWalkSegmenter {
    fn name(&self) -> &'static str {
        "graph-walk"
    }

    async fn segment(&self, _build: &BuildRef, arena: &NodeArena) -> Result<Vec<Segment>> {
        Ok(Self::walk(arena))
    }
}

/// Segmentation backed by a [`StageGraphAnalysis`] extension.
pub struct DelegatedSegmenter {
    analysis: Arc<dyn StageGraphAnalysis>,
}

impl DelegatedSegmenter {
    pub fn new(analysis: Arc<dyn StageGraphAnalysis>) -> Self {
        Self { analysis }
    }
}

#[async_trait]
impl Segmenter for DelegatedSegmenter {
    fn name(&self) -> &'static str {
        "delegated"
    }

    async fn segment(&self, build: &BuildRef, arena: &NodeArena) -> Result<Vec<Segment>> {
        let spans = match self.analysis.analyze(build, arena.nodes()).await {
            Ok(spans) => spans,
            Err(e) => {
                warn!("Stage analysis failed for {build}: {e}");
                return Err(e);
            }
        };

        let mut seen = HashSet::new();
        let mut segments = Vec::with_capacity(spans.len());

        for span in spans {
            let Some(boundary) = arena.position(&span.boundary_id) else {
                warn!(
                    "{}",
                    StageViewError::InvariantViolation(format!(
                        "stage span without boundary node {} in {build}",
                        span.boundary_id
                    ))
                );
                continue;
            };
            if !seen.insert(boundary) {
                warn!("Stage {} reported twice for {build}, keeping first", span.boundary_id);
                continue;
            }

            let mut members: Vec<NodeIdx> = span
                .node_ids
                .iter()
                .filter_map(|id| arena.position(id))
                .chain(std::iter::once(boundary))
                .filter(|&idx| idx >= boundary)
                .collect();
            members.sort_unstable();
            members.dedup();

            let name = span
                .name
                .filter(|name| !name.trim().is_empty())
                .or_else(|| {
                    arena
                        .get(boundary)
                        .and_then(|node| node.stage_label().map(ToString::to_string))
                })
                .unwrap_or_else(|| span.boundary_id.clone());

            segments.push(Segment {
                boundary,
                id: span.boundary_id,
                name,
                members,
                status_hint: span.status,
            });
        }

        segments.sort_by_key(|segment| segment.boundary);
        clip_to_next_boundary(&mut segments, build);
        Ok(segments)
    }
}

/// Drops members at or after the following segment's boundary.
fn clip_to_next_boundary(segments: &mut [Segment], build: &BuildRef) {
    let limits: Vec<Option<NodeIdx>> = segments
        .iter()
        .skip(1)
        .map(|next| Some(next.boundary))
        .chain(std::iter::once(None))
        .collect();

    for (segment, limit) in segments.iter_mut().zip(limits) {
        let Some(limit) = limit else { continue };
        let before = segment.members.len();
        segment.members.retain(|&idx| idx < limit);
        if segment.members.len() < before {
            warn!(
                "{}",
                StageViewError::InvariantViolation(format!(
                    "stage {} of {build} claimed {} node(s) past the next stage boundary",
                    segment.id,
                    before - segment.members.len()
                ))
            );
        }
    }
}
