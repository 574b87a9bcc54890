use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::build_ref::BuildRef;

use super::graph::NodeArena;
use super::segmenter::Segment;

/// Segmentation and aggregated logs for one version of a build's graph.
///
/// Approvals and statuses are not part of the layout; they are recomputed on
/// every view build.
#[derive(Debug)]
pub struct StageLayout {
    pub arena: NodeArena,
    pub segments: Vec<Segment>,
    /// Parallel to `segments`
    pub logs: Vec<String>,
    pub build_log: String,
    /// Some read failed transiently; the layout is a partial view
    pub degraded: bool,
}

/// Layout cache keyed by `(build, graph version)`.
///
/// Owned by the caller and shared across view builds. Only the newest version
/// of each build is kept: looking up a build with a different graph version
/// evicts the stale entry.
pub struct ViewCache {
    entries: Mutex<HashMap<BuildRef, (u64, Arc<StageLayout>)>>,
    enabled: bool,
}

impl ViewCache {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            debug!("View cache disabled");
        }
        Self {
            entries: Mutex::new(HashMap::new()),
            enabled,
        }
    }

    /// Returns the cached layout if it was computed for exactly `version`.
    pub fn get(&self, build: &BuildRef, version: u64) -> Option<Arc<StageLayout>> {
        if !self.enabled {
            return None;
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(build)
            .map(|(cached, layout)| (*cached, Arc::clone(layout)));

        match entry {
            Some((cached, layout)) if cached == version => {
                debug!("View cache hit for {build} at graph version {version}");
                Some(layout)
            }
            Some((cached, _)) => {
                debug!("Evicting {build} at graph version {cached}, now {version}");
                entries.remove(build);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, build: &BuildRef, version: u64, layout: Arc<StageLayout>) {
        if !self.enabled {
            return;
        }

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(build.clone(), (version, layout));
    }

    pub fn invalidate(&self, build: &BuildRef) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(build);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(true)
    }
}
