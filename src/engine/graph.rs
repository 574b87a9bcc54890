use std::collections::HashMap;

use log::warn;

use super::types::ExecutionNode;

pub type NodeIdx = usize;

/// Arena over one snapshot of a build's execution graph.
///
/// Nodes keep their chronological position as index. Each node records a
/// single primary-lineage pointer (its first parent); other parents of a
/// converging node are kept on the node but never followed.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<ExecutionNode>,
    index: HashMap<String, NodeIdx>,
    primary_parent: Vec<Option<NodeIdx>>,
}

impl NodeArena {
    pub fn new(nodes: Vec<ExecutionNode>) -> Self {
        let mut unique = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if index.contains_key(&node.id) {
                warn!("Duplicate execution node id {}, keeping first occurrence", node.id);
                continue;
            }
            index.insert(node.id.clone(), unique.len());
            unique.push(node);
        }

        let primary_parent = unique
            .iter()
            .map(|node| {
                node.parents
                    .first()
                    .and_then(|parent| index.get(parent).copied())
            })
            .collect();

        Self {
            nodes: unique,
            index,
            primary_parent,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, idx: NodeIdx) -> Option<&ExecutionNode> {
        self.nodes.get(idx)
    }

    pub fn position(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    pub fn nodes(&self) -> &[ExecutionNode] {
        &self.nodes
    }

    pub fn primary_parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.primary_parent.get(idx).copied().flatten()
    }

    /// `idx` followed by its primary ancestors, nearest first.
    pub fn lineage(&self, idx: NodeIdx) -> Lineage<'_> {
        Lineage {
            arena: self,
            next: (idx < self.nodes.len()).then_some(idx),
            remaining: self.nodes.len(),
        }
    }
}

pub struct Lineage<'a> {
    arena: &'a NodeArena,
    next: Option<NodeIdx>,
    // Bounds the walk so a malformed parent cycle cannot loop forever
    remaining: usize,
}

impl Iterator for Lineage<'_> {
    type Item = NodeIdx;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = self.arena.primary_parent(current);
        Some(current)
    }
}
