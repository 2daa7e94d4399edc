use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::types::{Bundle, BundleId};

/// The forest of output bundles, rooted at the entry bundles.
///
/// A parent→child edge means the child bundle is loaded on demand or in a
/// separate execution context from the parent. The tree is destroyed and
/// rebuilt each time the bundler runs.
#[derive(Clone, Debug, Default)]
pub struct BundleGraph {
  graph: DiGraph<BundleGraphNode, BundleGraphEdge>,
  pub bundles: Vec<Bundle>,
  bundle_node_by_id: HashMap<BundleId, NodeIndex>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BundleGraphNode {
  Root,
  Bundle(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BundleGraphEdge {}

impl BundleGraph {
  pub fn new() -> Self {
    let mut graph = DiGraph::new();

    graph.add_node(BundleGraphNode::Root);

    BundleGraph {
      graph,
      bundles: Vec::new(),
      bundle_node_by_id: HashMap::new(),
    }
  }

  pub fn root_node(&self) -> NodeIndex {
    NodeIndex::new(0)
  }

  pub fn add_bundle(&mut self, parent_idx: NodeIndex, bundle: Bundle) -> NodeIndex {
    let idx = self.bundles.len();
    let bundle_id = bundle.id.clone();

    self.bundles.push(bundle);

    let bundle_idx = self.graph.add_node(BundleGraphNode::Bundle(idx));
    self.bundle_node_by_id.insert(bundle_id, bundle_idx);

    self
      .graph
      .add_edge(parent_idx, bundle_idx, BundleGraphEdge {});

    bundle_idx
  }

  /// Attach an additional parent to an existing bundle. A bundle referenced
  /// from several places is loaded by each of them but packaged once.
  pub fn add_edge(&mut self, parent_idx: &NodeIndex, child_idx: &NodeIndex) {
    if self.graph.find_edge(*parent_idx, *child_idx).is_none() {
      self
        .graph
        .add_edge(*parent_idx, *child_idx, BundleGraphEdge {});
    }
  }

  pub fn bundle_index(&self, node_index: NodeIndex) -> Option<usize> {
    match self.graph.node_weight(node_index)? {
      BundleGraphNode::Bundle(idx) => Some(*idx),
      BundleGraphNode::Root => None,
    }
  }

  pub fn get_bundle(&self, node_index: NodeIndex) -> Option<&Bundle> {
    self.bundle_index(node_index).map(|idx| &self.bundles[idx])
  }

  pub fn get_bundle_mut(&mut self, node_index: NodeIndex) -> Option<&mut Bundle> {
    let idx = self.bundle_index(node_index)?;
    Some(&mut self.bundles[idx])
  }

  pub fn bundle_node_by_id(&self, bundle_id: &str) -> Option<NodeIndex> {
    self.bundle_node_by_id.get(bundle_id).copied()
  }

  /// Root bundles, in entry order.
  pub fn root_bundle_nodes(&self) -> Vec<NodeIndex> {
    self.children(self.root_node())
  }

  /// Child bundles of a bundle, in the order they were attached.
  pub fn children(&self, node: NodeIndex) -> Vec<NodeIndex> {
    let mut children: Vec<NodeIndex> = self
      .graph
      .neighbors_directed(node, Direction::Outgoing)
      .collect();
    children.reverse();
    children
  }

  pub fn parents(&self, node: NodeIndex) -> Vec<NodeIndex> {
    let mut parents: Vec<NodeIndex> = self
      .graph
      .neighbors_directed(node, Direction::Incoming)
      .collect();
    parents.reverse();
    parents
  }

  /// The first parent a bundle was attached to. Used as the canonical tree
  /// edge when computing common ancestors.
  pub fn primary_parent(&self, node: NodeIndex) -> Option<NodeIndex> {
    self.parents(node).into_iter().next()
  }

  /// Path from a bundle up to the root via primary parents, starting with
  /// the bundle itself.
  pub fn ancestor_chain(&self, node: NodeIndex) -> Vec<NodeIndex> {
    let mut chain = vec![node];
    let mut current = node;

    while let Some(parent) = self.primary_parent(current) {
      if parent == self.root_node() {
        break;
      }
      // Primary parent chains never cycle, but guard against defects
      if chain.contains(&parent) {
        break;
      }
      chain.push(parent);
      current = parent;
    }

    chain
  }

  pub fn all_bundle_nodes(&self) -> Vec<NodeIndex> {
    self
      .graph
      .node_indices()
      .filter(|node| self.bundle_index(*node).is_some())
      .collect()
  }
}
