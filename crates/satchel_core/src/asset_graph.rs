use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::types::{Asset, AssetId, Dependency};

/// The cyclic graph of assets and dependency edges, rooted at the entry
/// dependencies.
///
/// Nodes alternate between assets and dependencies: an asset's outgoing
/// edges point at dependency nodes, and each resolved dependency node points
/// at exactly one asset node. Cycles (mutual requires) are a supported
/// shape; traversal uses visited sets, never unguarded recursion.
#[derive(Clone, Debug, Default)]
pub struct AssetGraph {
  graph: DiGraph<AssetGraphNode, AssetGraphEdge>,
  pub assets: Vec<AssetNode>,
  pub dependencies: Vec<DependencyNode>,
  asset_node_by_id: HashMap<AssetId, NodeIndex>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetNode {
  pub asset: Asset,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DependencyNode {
  pub dependency: Arc<Dependency>,
  pub state: DependencyState,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssetGraphNode {
  Root,
  Asset(usize),
  Dependency(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetGraphEdge {}

#[derive(Clone, Debug, PartialEq)]
pub enum DependencyState {
  New,
  /// The dependency was optional and could not be resolved, or was mapped
  /// to an empty module by the resolver
  Excluded,
  Resolved,
}

impl AssetGraph {
  pub fn new() -> Self {
    let mut graph = DiGraph::new();

    graph.add_node(AssetGraphNode::Root);

    AssetGraph {
      graph,
      assets: Vec::new(),
      dependencies: Vec::new(),
      asset_node_by_id: HashMap::new(),
    }
  }

  pub fn root_node(&self) -> NodeIndex {
    // The root node index will always be 0
    NodeIndex::new(0)
  }

  pub fn add_asset(&mut self, parent_idx: NodeIndex, asset: Asset) -> NodeIndex {
    let idx = self.assets.len();
    let asset_id = asset.id.clone();

    self.assets.push(AssetNode { asset });

    let asset_idx = self.graph.add_node(AssetGraphNode::Asset(idx));
    self.asset_node_by_id.insert(asset_id, asset_idx);

    self
      .graph
      .add_edge(parent_idx, asset_idx, AssetGraphEdge {});

    asset_idx
  }

  pub fn add_entry_dependency(&mut self, dependency: Dependency) -> NodeIndex {
    self.add_dependency(self.root_node(), dependency)
  }

  pub fn add_dependency(&mut self, parent_idx: NodeIndex, dependency: Dependency) -> NodeIndex {
    let idx = self.dependencies.len();

    self.dependencies.push(DependencyNode {
      dependency: Arc::new(dependency),
      state: DependencyState::New,
    });

    let dependency_idx = self.graph.add_node(AssetGraphNode::Dependency(idx));

    self
      .graph
      .add_edge(parent_idx, dependency_idx, AssetGraphEdge {});

    dependency_idx
  }

  pub fn add_edge(&mut self, parent_idx: &NodeIndex, child_idx: &NodeIndex) {
    self
      .graph
      .add_edge(*parent_idx, *child_idx, AssetGraphEdge {});
  }

  pub fn dependency_index(&self, node_index: NodeIndex) -> Option<usize> {
    match self.graph.node_weight(node_index)? {
      AssetGraphNode::Dependency(idx) => Some(*idx),
      _ => None,
    }
  }

  pub fn asset_index(&self, node_index: NodeIndex) -> Option<usize> {
    match self.graph.node_weight(node_index)? {
      AssetGraphNode::Asset(idx) => Some(*idx),
      _ => None,
    }
  }

  pub fn get_asset(&self, node_index: NodeIndex) -> Option<&Asset> {
    self
      .asset_index(node_index)
      .map(|idx| &self.assets[idx].asset)
  }

  pub fn get_dependency(&self, node_index: NodeIndex) -> Option<&Arc<Dependency>> {
    self
      .dependency_index(node_index)
      .map(|idx| &self.dependencies[idx].dependency)
  }

  pub fn set_dependency_state(&mut self, node_index: NodeIndex, state: DependencyState) {
    if let Some(idx) = self.dependency_index(node_index) {
      self.dependencies[idx].state = state;
    }
  }

  pub fn asset_node_by_id(&self, asset_id: &str) -> Option<NodeIndex> {
    self.asset_node_by_id.get(asset_id).copied()
  }

  pub fn get_asset_by_id(&self, asset_id: &str) -> Option<&Asset> {
    self
      .asset_node_by_id(asset_id)
      .and_then(|idx| self.get_asset(idx))
  }

  /// Entry dependency nodes in the order they were added.
  pub fn entry_dependency_nodes(&self) -> Vec<NodeIndex> {
    self.children(self.root_node())
  }

  /// Outgoing dependency nodes of an asset, in source order.
  pub fn outgoing_dependency_nodes(&self, asset_node: NodeIndex) -> Vec<NodeIndex> {
    self
      .children(asset_node)
      .into_iter()
      .filter(|node| self.dependency_index(*node).is_some())
      .collect()
  }

  /// The asset a dependency resolved to, if any.
  pub fn resolved_asset_node(&self, dependency_node: NodeIndex) -> Option<NodeIndex> {
    self
      .children(dependency_node)
      .into_iter()
      .find(|node| self.asset_index(*node).is_some())
  }

  /// All asset nodes, in insertion order.
  pub fn asset_nodes(&self) -> Vec<NodeIndex> {
    self
      .graph
      .node_indices()
      .filter(|node| self.asset_index(*node).is_some())
      .collect()
  }

  fn children(&self, node: NodeIndex) -> Vec<NodeIndex> {
    // petgraph iterates neighbors in reverse insertion order; reverse to
    // restore the order edges were added in
    let mut children: Vec<NodeIndex> = self
      .graph
      .neighbors_directed(node, Direction::Outgoing)
      .collect();
    children.reverse();
    children
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use crate::types::Priority;

  use super::*;

  fn asset(path: &str) -> Asset {
    Asset {
      id: format!("id-{path}"),
      file_path: PathBuf::from(path),
      ..Asset::default()
    }
  }

  #[test]
  fn connects_entry_dependencies_to_the_root() {
    let mut graph = AssetGraph::new();

    let entry_a = graph.add_entry_dependency(Dependency::entry(String::from("a.js")));
    let entry_b = graph.add_entry_dependency(Dependency::entry(String::from("b.js")));

    assert_eq!(graph.entry_dependency_nodes(), vec![entry_a, entry_b]);
  }

  #[test]
  fn preserves_dependency_source_order() {
    let mut graph = AssetGraph::new();

    let entry = graph.add_entry_dependency(Dependency::entry(String::from("index.js")));
    let index = graph.add_asset(entry, asset("index.js"));

    let dep_a = graph.add_dependency(index, Dependency::new("./a".into(), "id-index.js".into()));
    let dep_b = graph.add_dependency(index, Dependency::new("./b".into(), "id-index.js".into()));
    let dep_c = graph.add_dependency(index, Dependency::new("./c".into(), "id-index.js".into()));

    assert_eq!(
      graph.outgoing_dependency_nodes(index),
      vec![dep_a, dep_b, dep_c]
    );
  }

  #[test]
  fn supports_cycles_between_assets() {
    let mut graph = AssetGraph::new();

    let entry = graph.add_entry_dependency(Dependency::entry(String::from("a.js")));
    let a = graph.add_asset(entry, asset("a.js"));
    let dep_b = graph.add_dependency(a, Dependency::new("./b".into(), "id-a.js".into()));
    let b = graph.add_asset(dep_b, asset("b.js"));
    let dep_a = graph.add_dependency(b, Dependency::new("./a".into(), "id-b.js".into()));

    // b depends back on a, which already exists; only an edge is added
    graph.add_edge(&dep_a, &a);

    assert_eq!(graph.assets.len(), 2);
    assert_eq!(graph.resolved_asset_node(dep_a), Some(a));
    assert_eq!(graph.resolved_asset_node(dep_b), Some(b));
  }

  #[test]
  fn looks_up_assets_by_id() {
    let mut graph = AssetGraph::new();

    let entry = graph.add_entry_dependency(Dependency::entry(String::from("index.js")));
    let node = graph.add_asset(entry, asset("index.js"));

    assert_eq!(graph.asset_node_by_id("id-index.js"), Some(node));
    assert!(graph.get_asset_by_id("missing").is_none());
  }

  #[test]
  fn dependency_state_can_be_updated() {
    let mut graph = AssetGraph::new();

    let entry = graph.add_entry_dependency(Dependency {
      priority: Priority::Lazy,
      ..Dependency::entry(String::from("index.js"))
    });

    graph.set_dependency_state(entry, DependencyState::Resolved);

    assert_eq!(
      graph.dependencies[0].state,
      DependencyState::Resolved
    );
  }
}
