use futures::future::join_all;
use log::{debug, warn};

use crate::build_ref::BuildRef;

use super::graph::NodeArena;
use super::segmenter::Segment;
use super::sources::GraphReader;

/// Log text of a stage or of the whole build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedLog {
    pub text: String,
    /// False when some chunk could not be read
    pub complete: bool,
}

/// Concatenates node logs per stage and reads the whole-build log.
#[derive(Debug, Clone, Default)]
pub struct LogAggregator {
    max_stage_log_bytes: Option<usize>,
}

impl LogAggregator {
    /// # Arguments
    ///
    /// * `max_stage_log_bytes` - Optional bound per stage; older output is dropped first
    pub fn new(max_stage_log_bytes: Option<usize>) -> Self {
        Self {
            max_stage_log_bytes,
        }
    }

    /// Log text of one segment, in node encounter order.
    ///
    /// Other stages' boundary nodes are never read, so a segment cannot pick up
    /// output that belongs to the stage after it. Unreadable chunks are skipped.
    pub async fn segment_log(
        &self,
        reader: &dyn GraphReader,
        build: &BuildRef,
        arena: &NodeArena,
        segment: &Segment,
    ) -> AggregatedLog {
        let handles: Vec<(&str, &str)> = segment
            .members
            .iter()
            .filter_map(|&idx| arena.get(idx).map(|node| (idx, node)))
            .filter(|(idx, node)| *idx == segment.boundary || !node.is_stage_boundary())
            .filter_map(|(_, node)| {
                node.log_handle
                    .as_deref()
                    .map(|handle| (node.id.as_str(), handle))
            })
            .collect();

        // Reads run concurrently; join_all preserves input order
        let chunks = join_all(
            handles
                .iter()
                .map(|(_, handle)| reader.read_log(build, handle)),
        )
        .await;

        let mut log = String::new();
        let mut complete = true;
        for ((node_id, _), chunk) in handles.iter().zip(chunks) {
            match chunk {
                Ok(text) => append_chunk(&mut log, &text),
                Err(e) => {
                    warn!("Skipping log of node {node_id} in {build}: {e}");
                    complete = false;
                }
            }
        }

        debug!(
            "Aggregated {} bytes for stage {} of {build}",
            log.len(),
            segment.name
        );
        AggregatedLog {
            text: self.bounded(log),
            complete,
        }
    }

    /// Log of the synthetic ALL stage, read from the build-level source.
    pub async fn build_log(&self, reader: &dyn GraphReader, build: &BuildRef) -> AggregatedLog {
        match reader.read_build_log(build).await {
            Ok(log) => AggregatedLog {
                text: self.bounded(log),
                complete: true,
            },
            Err(e) => {
                warn!("Build log of {build} unavailable: {e}");
                AggregatedLog::default()
            }
        }
    }

    fn bounded(&self, log: String) -> String {
        match self.max_stage_log_bytes {
            Some(max) => keep_tail(log, max),
            None => log,
        }
    }
}

/// Appends a chunk, keeping the output newline-aligned.
fn append_chunk(out: &mut String, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    out.push_str(chunk);
    if !chunk.ends_with('\n') {
        out.push('\n');
    }
}

/// Keeps roughly the newest `max` bytes, starting at a line break if one is
/// available and always on a UTF-8 boundary.
fn keep_tail(log: String, max: usize) -> String {
    if log.len() <= max {
        return log;
    }

    let mut cut = log.len() - max;
    while !log.is_char_boundary(cut) {
        cut += 1;
    }
    if let Some(offset) = log[cut..].find('\n') {
        if cut + offset + 1 < log.len() {
            cut += offset + 1;
        }
    }

    format!("[... {cut} bytes truncated ...]\n{}", &log[cut..])
}
