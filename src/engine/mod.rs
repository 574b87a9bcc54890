//! Stage & approval reconciliation.
//!
//! Turns a build's execution graph and its pending approvals into a
//! [`BuildView`](crate::view::BuildView), and resolves or cancels approvals.

mod builder;
mod cache;
mod controller;
mod correlator;
mod graph;
mod logs;
mod segmenter;
mod status;
pub mod sources;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::StageViewBuilder;
pub use cache::{StageLayout, ViewCache};
pub use controller::{bind_parameters, coerce, ApprovalController, SubmittedValues};
pub use correlator::{correlate, Correlation};
pub use graph::{NodeArena, NodeIdx};
pub use logs::{AggregatedLog, LogAggregator};
pub use segmenter::{
    select_segmenter, DelegatedSegmenter, GraphWalkSegmenter, Segment, SegmentationMode,
    Segmenter,
};
pub use status::{resolve_overall_status, resolve_stage_status, result_to_status};
