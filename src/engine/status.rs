use log::warn;

use crate::view::StageStatus;

use super::graph::NodeArena;
use super::segmenter::Segment;
use super::types::BuildMetadata;

/// Status of one real stage. Rules are evaluated top-down, first match wins.
///
/// Only a delegated analysis can report `UNSTABLE` for a stage; node flags
/// alone never produce it.
pub fn resolve_stage_status(arena: &NodeArena, segment: &Segment, has_approval: bool) -> StageStatus {
    if has_approval {
        return StageStatus::PausedPendingInput;
    }

    if let Some(hint) = segment.status_hint {
        return hint;
    }

    if arena.get(segment.boundary).is_some_and(|node| node.active) {
        return StageStatus::InProgress;
    }

    let errored = segment
        .members
        .iter()
        .filter_map(|&idx| arena.get(idx))
        .any(|node| node.error_present);

    if errored {
        StageStatus::Failed
    } else {
        StageStatus::Success
    }
}

/// Status of the synthetic ALL stage.
pub fn resolve_all_stage_status(overall: StageStatus, has_approval: bool) -> StageStatus {
    if has_approval {
        StageStatus::PausedPendingInput
    } else {
        overall
    }
}

pub fn resolve_overall_status(metadata: &BuildMetadata) -> StageStatus {
    if metadata.running {
        return StageStatus::InProgress;
    }

    metadata
        .result
        .as_deref()
        .map_or(StageStatus::NotStarted, result_to_status)
}

/// Maps a terminal build result to a status; unrecognized results are
/// reported as `UNSTABLE`.
pub fn result_to_status(result: &str) -> StageStatus {
    match result.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" => StageStatus::Success,
        "FAILURE" | "FAILED" => StageStatus::Failed,
        "ABORTED" => StageStatus::Aborted,
        "UNSTABLE" => StageStatus::Unstable,
        "NOT_BUILT" => StageStatus::NotStarted,
        other => {
            warn!("Unrecognized build result '{other}', reporting UNSTABLE");
            StageStatus::Unstable
        }
    }
}

pub fn is_executed(status: StageStatus) -> bool {
    status != StageStatus::NotStarted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{active, boundary, errored, step};
    use crate::engine::segmenter::GraphWalkSegmenter;

    fn metadata(running: bool, result: Option<&str>) -> BuildMetadata {
        BuildMetadata {
            job_full_name: "deploy".to_string(),
            number: 42,
            url: String::new(),
            running,
            result: result.map(ToString::to_string),
            start_time_millis: 0,
            duration_millis: None,
        }
    }

    #[cfg(test)]
    mod stage_status {
        use super::*;

        #[test]
        fn approval_wins_over_everything() {
            let arena = NodeArena::new(vec![active(errored(boundary("2", "Approve", "")))]);
            let segment = &GraphWalkSegmenter::walk(&arena)[0];
            assert_eq!(
                resolve_stage_status(&arena, segment, true),
                StageStatus::PausedPendingInput
            );
        }

        #[test]
        fn active_boundary_is_in_progress() {
            let arena = NodeArena::new(vec![active(boundary("2", "Build", "")), errored(step("3", "2"))]);
            let segment = &GraphWalkSegmenter::walk(&arena)[0];
            assert_eq!(resolve_stage_status(&arena, segment, false), StageStatus::InProgress);
        }

        #[test]
        fn error_in_any_member_fails_stage() {
            let arena = NodeArena::new(vec![
                boundary("2", "Build", ""),
                step("3", "2"),
                errored(step("4", "3")),
            ]);
            let segment = &GraphWalkSegmenter::walk(&arena)[0];
            assert_eq!(resolve_stage_status(&arena, segment, false), StageStatus::Failed);
        }

        #[test]
        fn error_after_next_boundary_is_not_counted() {
            let arena = NodeArena::new(vec![
                boundary("2", "Build", ""),
                boundary("3", "Test", "2"),
                errored(step("4", "3")),
            ]);
            let segments = GraphWalkSegmenter::walk(&arena);
            assert_eq!(resolve_stage_status(&arena, &segments[0], false), StageStatus::Success);
            assert_eq!(resolve_stage_status(&arena, &segments[1], false), StageStatus::Failed);
        }

        #[test]
        fn delegated_hint_applies_after_approval() {
            let arena = NodeArena::new(vec![boundary("2", "Test", "")]);
            let mut segment = GraphWalkSegmenter::walk(&arena).remove(0);
            segment.status_hint = Some(StageStatus::Unstable);
            assert_eq!(resolve_stage_status(&arena, &segment, false), StageStatus::Unstable);
            assert_eq!(
                resolve_stage_status(&arena, &segment, true),
                StageStatus::PausedPendingInput
            );
        }
    }

    #[cfg(test)]
    mod overall_status {
        use super::*;

        #[test]
        fn running_build_is_in_progress() {
            assert_eq!(
                resolve_overall_status(&metadata(true, Some("FAILURE"))),
                StageStatus::InProgress
            );
        }

        #[test]
        fn known_results_map_directly() {
            assert_eq!(resolve_overall_status(&metadata(false, Some("SUCCESS"))), StageStatus::Success);
            assert_eq!(resolve_overall_status(&metadata(false, Some("FAILURE"))), StageStatus::Failed);
            assert_eq!(resolve_overall_status(&metadata(false, Some("ABORTED"))), StageStatus::Aborted);
            assert_eq!(resolve_overall_status(&metadata(false, Some("unstable"))), StageStatus::Unstable);
        }

        #[test]
        fn unrecognized_result_defaults_to_unstable() {
            assert_eq!(resolve_overall_status(&metadata(false, Some("WEIRD"))), StageStatus::Unstable);
        }

        #[test]
        fn missing_result_is_not_started() {
            assert_eq!(resolve_overall_status(&metadata(false, None)), StageStatus::NotStarted);
        }
    }

    #[test]
    fn test_executed_flag() {
        assert!(!is_executed(StageStatus::NotStarted));
        assert!(is_executed(StageStatus::PausedPendingInput));
        assert!(is_executed(StageStatus::Success));
    }

    #[test]
    fn test_all_stage_status_follows_overall() {
        assert_eq!(
            resolve_all_stage_status(StageStatus::InProgress, false),
            StageStatus::InProgress
        );
        assert_eq!(
            resolve_all_stage_status(StageStatus::InProgress, true),
            StageStatus::PausedPendingInput
        );
    }
}
