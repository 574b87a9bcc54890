use std::collections::HashMap;

use log::{debug, warn};

use super::graph::{NodeArena, NodeIdx};
use super::segmenter::Segment;
use super::types::Approval;

/// Pending approvals placed onto the stages that raised them.
#[derive(Debug, Default)]
pub struct Correlation {
    /// Parallel to the segment list
    pub by_segment: Vec<Option<Approval>>,
    /// Approvals whose origin maps to no segment
    pub all: Option<Approval>,
}

impl Correlation {
    pub fn for_segment(&self, index: usize) -> Option<&Approval> {
        self.by_segment.get(index).and_then(Option::as_ref)
    }
}

/// Attaches each approval (in registry order) to the segment containing its
/// origin node, climbing the origin's primary lineage when the node itself is
/// not a member. Unresolvable origins go to the ALL stage.
///
/// A stage shows at most one approval; later ones for the same stage are
/// logged and skipped.
pub fn correlate(arena: &NodeArena, segments: &[Segment], approvals: Vec<Approval>) -> Correlation {
    let mut owner: HashMap<NodeIdx, usize> = HashMap::new();
    for (segment_index, segment) in segments.iter().enumerate() {
        for &member in &segment.members {
            owner.entry(member).or_insert(segment_index);
        }
    }

    let mut correlation = Correlation {
        by_segment: vec![None; segments.len()],
        all: None,
    };

    for approval in approvals {
        let slot = match locate(arena, &owner, &approval.origin_node_id) {
            Some(segment_index) => {
                debug!(
                    "Approval {} belongs to stage {}",
                    approval.id, segments[segment_index].name
                );
                &mut correlation.by_segment[segment_index]
            }
            None => {
                debug!(
                    "Approval {} origin {} maps to no stage, attaching to ALL",
                    approval.id, approval.origin_node_id
                );
                &mut correlation.all
            }
        };

        if let Some(existing) = slot.as_ref() {
            warn!(
                "Approval {} shares a stage with approval {}, only the first is shown",
                approval.id, existing.id
            );
            continue;
        }
        *slot = Some(approval);
    }

    correlation
}

fn locate(arena: &NodeArena, owner: &HashMap<NodeIdx, usize>, origin: &str) -> Option<usize> {
    let start = arena.position(origin)?;
    arena
        .lineage(start)
        .find_map(|idx| owner.get(&idx).copied())
}
