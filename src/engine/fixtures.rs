//! In-memory collaborators for engine tests.
//!
//! Log handles of fixture nodes carry the log text itself.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::build_ref::BuildRef;
use crate::error::{Result, StageViewError};

use super::sources::{ApprovalRegistry, BoundParameters, BuildMetadataProvider, GraphReader};
use super::types::{
    Approval, BuildMetadata, ExecutionNode, NodeKind, ParameterType, ParameterValue,
    RequiredParameter,
};

pub(crate) fn step(id: &str, parent: &str) -> ExecutionNode {
    ExecutionNode {
        id: id.to_string(),
        kind: NodeKind::Step,
        label: None,
        parents: if parent.is_empty() {
            vec![]
        } else {
            vec![parent.to_string()]
        },
        active: false,
        error_present: false,
        start_time_millis: 0,
        log_handle: None,
    }
}

pub(crate) fn boundary(id: &str, label: &str, parent: &str) -> ExecutionNode {
    ExecutionNode {
        kind: NodeKind::Boundary,
        label: Some(label.to_string()),
        ..step(id, parent)
    }
}

pub(crate) fn unlabeled_boundary(id: &str, parent: &str) -> ExecutionNode {
    ExecutionNode {
        kind: NodeKind::Boundary,
        ..step(id, parent)
    }
}

pub(crate) fn logged(node: ExecutionNode, text: &str) -> ExecutionNode {
    ExecutionNode {
        log_handle: Some(text.to_string()),
        ..node
    }
}

pub(crate) fn active(node: ExecutionNode) -> ExecutionNode {
    ExecutionNode {
        active: true,
        ..node
    }
}

pub(crate) fn errored(node: ExecutionNode) -> ExecutionNode {
    ExecutionNode {
        error_present: true,
        ..node
    }
}

pub(crate) fn started_at(node: ExecutionNode, millis: i64) -> ExecutionNode {
    ExecutionNode {
        start_time_millis: millis,
        ..node
    }
}

pub(crate) fn bool_param(name: &str, default: bool) -> RequiredParameter {
    RequiredParameter {
        name: name.to_string(),
        declared_type: ParameterType::Boolean,
        description: String::new(),
        default_value: Some(ParameterValue::Boolean(default)),
        choices: vec![],
        required: false,
    }
}

pub(crate) fn text_param(name: &str, kind: ParameterType, default: Option<&str>) -> RequiredParameter {
    RequiredParameter {
        name: name.to_string(),
        declared_type: kind,
        description: String::new(),
        default_value: default.map(|value| ParameterValue::Text(value.to_string())),
        choices: vec![],
        required: true,
    }
}

pub(crate) fn approval(id: &str, origin: &str, parameters: Vec<RequiredParameter>) -> Approval {
    Approval {
        id: id.to_string(),
        message: format!("Approve {id}?"),
        submitter_pattern: None,
        proceed_label: "Proceed".to_string(),
        parameters,
        origin_node_id: origin.to_string(),
    }
}

pub(crate) struct FakeBackend {
    build: BuildRef,
    metadata: Mutex<BuildMetadata>,
    nodes: Mutex<Vec<ExecutionNode>>,
    build_log: String,
    pending: Mutex<Vec<Approval>>,
    pub(crate) resolved: Mutex<Vec<(String, BoundParameters)>>,
    pub(crate) cancelled: Mutex<Vec<String>>,
    failing_logs: HashSet<String>,
    transient_nodes: bool,
    failing_node_reads: AtomicUsize,
    broken_registry: bool,
}

impl FakeBackend {
    pub(crate) fn new(job: &str, number: u64) -> Self {
        Self {
            build: BuildRef::new(job, number),
            metadata: Mutex::new(BuildMetadata {
                job_full_name: job.to_string(),
                number,
                url: format!("https://ci.example.com/job/{job}/{number}/"),
                running: false,
                result: Some("SUCCESS".to_string()),
                start_time_millis: 0,
                duration_millis: Some(0),
            }),
            nodes: Mutex::new(vec![]),
            build_log: String::new(),
            pending: Mutex::new(vec![]),
            resolved: Mutex::new(vec![]),
            cancelled: Mutex::new(vec![]),
            failing_logs: HashSet::new(),
            transient_nodes: false,
            failing_node_reads: AtomicUsize::new(0),
            broken_registry: false,
        }
    }

    pub(crate) fn with_nodes(self, nodes: Vec<ExecutionNode>) -> Self {
        *self.nodes.lock().unwrap() = nodes;
        self
    }

    pub(crate) fn with_build_log(mut self, log: &str) -> Self {
        self.build_log = log.to_string();
        self
    }

    pub(crate) fn with_approvals(self, approvals: Vec<Approval>) -> Self {
        *self.pending.lock().unwrap() = approvals;
        self
    }

    pub(crate) fn with_failing_log(mut self, handle: &str) -> Self {
        self.failing_logs.insert(handle.to_string());
        self
    }

    pub(crate) fn with_transient_nodes(mut self) -> Self {
        self.transient_nodes = true;
        self
    }

    pub(crate) fn with_broken_registry(mut self) -> Self {
        self.broken_registry = true;
        self
    }

    pub(crate) fn running(self) -> Self {
        {
            let mut metadata = self.metadata.lock().unwrap();
            metadata.running = true;
            metadata.result = None;
            metadata.duration_millis = None;
        }
        self
    }

    pub(crate) fn finished(self, result: &str, start: i64, duration: i64) -> Self {
        {
            let mut metadata = self.metadata.lock().unwrap();
            metadata.running = false;
            metadata.result = Some(result.to_string());
            metadata.start_time_millis = start;
            metadata.duration_millis = Some(duration);
        }
        self
    }

    pub(crate) fn build(&self) -> BuildRef {
        self.build.clone()
    }

    pub(crate) fn nodes(&self) -> Vec<ExecutionNode> {
        self.nodes.lock().unwrap().clone()
    }

    pub(crate) fn append_node(&self, node: ExecutionNode) {
        self.nodes.lock().unwrap().push(node);
    }

    /// Makes the next `count` node listings fail transiently.
    pub(crate) fn fail_next_node_reads(&self, count: usize) {
        self.failing_node_reads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn withdraw_approval(&self, id: &str) {
        self.pending.lock().unwrap().retain(|approval| approval.id != id);
    }

    fn check(&self, build: &BuildRef) -> Result<()> {
        if *build == self.build {
            Ok(())
        } else {
            Err(StageViewError::BuildNotFound(build.to_string()))
        }
    }
}

#[async_trait]
impl GraphReader for FakeBackend {
    async fn list_nodes(&self, build: &BuildRef) -> Result<Vec<ExecutionNode>> {
        self.check(build)?;
        let failing_once = self
            .failing_node_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if self.transient_nodes || failing_once {
            return Err(StageViewError::TransientRead("graph store busy".into()));
        }
        Ok(self.nodes())
    }

    async fn read_log(&self, build: &BuildRef, handle: &str) -> Result<String> {
        self.check(build)?;
        if self.failing_logs.contains(handle) {
            return Err(StageViewError::TransientRead(format!("log {handle} unavailable")));
        }
        Ok(handle.to_string())
    }

    async fn read_build_log(&self, build: &BuildRef) -> Result<String> {
        self.check(build)?;
        Ok(self.build_log.clone())
    }

    async fn graph_version(&self, build: &BuildRef) -> Result<u64> {
        self.check(build)?;
        Ok(self.nodes().len() as u64)
    }
}

#[async_trait]
impl ApprovalRegistry for FakeBackend {
    async fn list_pending(&self, build: &BuildRef) -> Result<Vec<Approval>> {
        self.check(build)?;
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn resolve(
        &self,
        build: &BuildRef,
        approval_id: &str,
        parameters: &BoundParameters,
    ) -> Result<bool> {
        self.check(build)?;
        if self.broken_registry {
            return Err(StageViewError::TransientRead("registry unavailable".into()));
        }
        let mut pending = self.pending.lock().unwrap();
        let Some(position) = pending.iter().position(|a| a.id == approval_id) else {
            return Ok(false);
        };
        pending.remove(position);
        self.resolved
            .lock()
            .unwrap()
            .push((approval_id.to_string(), parameters.clone()));
        Ok(true)
    }

    async fn cancel(&self, build: &BuildRef, approval_id: &str) -> Result<bool> {
        self.check(build)?;
        if self.broken_registry {
            return Err(StageViewError::TransientRead("registry unavailable".into()));
        }
        let mut pending = self.pending.lock().unwrap();
        let Some(position) = pending.iter().position(|a| a.id == approval_id) else {
            return Ok(false);
        };
        pending.remove(position);
        self.cancelled.lock().unwrap().push(approval_id.to_string());
        Ok(true)
    }
}

#[async_trait]
impl BuildMetadataProvider for FakeBackend {
    async fn metadata(&self, build: &BuildRef) -> Result<BuildMetadata> {
        self.check(build)?;
        Ok(self.metadata.lock().unwrap().clone())
    }
}
