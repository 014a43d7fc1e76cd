use defectgraph_core::model::{Node, NodeType, Relationship, RelationType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Append-only node/relationship store.
///
/// Nodes are unique by id (first insert wins) and kept in insertion order.
/// Relationships are appended as given: duplicates are kept and endpoints are
/// not checked against the node set.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    positions: HashMap<String, usize>,
    relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_relationships: usize,
    pub images: usize,
    pub defects: usize,
    pub equipment: usize,
    pub standards: usize,
    pub dangling_relationships: usize,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from raw collections, applying the same insert rules
    /// as [`GraphStore::add_node`].
    pub fn from_parts(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        let mut store = Self::new();
        for node in nodes {
            store.add_node(node);
        }
        store.relationships = relationships;
        store
    }

    /// Returns false when a node with the same id already exists; the stored
    /// node is left untouched in that case.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.positions.contains_key(&node.id) {
            debug!("Ignoring duplicate node {}", node.id);
            return false;
        }
        self.positions.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.positions.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    pub fn nodes_by_type<'a>(&'a self, node_type: &NodeType) -> impl Iterator<Item = &'a Node> + 'a {
        let node_type = node_type.clone();
        self.nodes.iter().filter(move |n| n.is(&node_type))
    }

    pub fn relationships_of<'a>(
        &'a self,
        relation_type: &RelationType,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        let relation_type = relation_type.clone();
        self.relationships
            .iter()
            .filter(move |r| r.relation_type == relation_type)
    }

    /// 1-hop traversal along outgoing edges of one type. Targets come back in
    /// node insertion order, each at most once; dangling targets are skipped.
    pub fn related_nodes(&self, node_id: &str, relation_type: &RelationType) -> Vec<&Node> {
        let targets: HashSet<&str> = self
            .relationships_of(relation_type)
            .filter(|r| r.from_node_id == node_id)
            .map(|r| r.to_node_id.as_str())
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }
        self.nodes
            .iter()
            .filter(|n| targets.contains(n.id.as_str()))
            .collect()
    }

    /// Relationships with at least one endpoint that names no stored node.
    pub fn dangling_relationships(&self) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| !self.contains_node(&r.from_node_id) || !self.contains_node(&r.to_node_id))
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let count = |t: NodeType| self.nodes_by_type(&t).count();
        GraphStats {
            total_nodes: self.nodes.len(),
            total_relationships: self.relationships.len(),
            images: count(NodeType::Image),
            defects: count(NodeType::Defect),
            equipment: count(NodeType::Equipment),
            standards: count(NodeType::Standard),
            dangling_relationships: self.dangling_relationships().len(),
        }
    }
}
