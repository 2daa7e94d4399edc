use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use satchel_core::asset_graph::AssetGraph;
use satchel_core::bundle_graph::BundleGraph;
use satchel_core::diagnostic::BundlingInvariantViolation;
use satchel_core::types::{
  create_bundle_id, Asset, AssetId, Bundle, BundleBehavior, Dependency, FileType, Priority,
  SatchelOptions,
};

/// Splits the asset graph into the output bundle tree.
///
/// Bundle boundaries, in precedence order: every entry seeds its own
/// isolated root bundle; lazy and worker dependencies start child bundles;
/// an asset whose type differs from its consumer's bundle starts a typed
/// companion bundle; isolated (raw) assets always get a leaf bundle of
/// their own. Assets sync-reachable from several bundles are hoisted to
/// the nearest common ancestor of the asset's own type, or duplicated when
/// there is none. Worker bundles run in their own global context and are
/// placement roots: nothing hoists out of them. When source maps are
/// enabled every non-isolated bundle gets one synthetic map child.
pub struct BundleGraphBuilder<'a> {
  asset_graph: &'a AssetGraph,
  source_maps: bool,
  bundle_graph: BundleGraph,
  /// Bundles each asset is sync-reachable from, in discovery order
  consumers: IndexMap<AssetId, Vec<NodeIndex>>,
  /// One bundle per lazy/worker target asset, shared by all referents
  boundary_bundles: HashMap<AssetId, NodeIndex>,
  /// One leaf bundle per isolated asset
  isolated_bundles: HashMap<AssetId, NodeIndex>,
  /// One typed companion bundle per (consumer bundle, file type)
  typed_companions: HashMap<(NodeIndex, FileType), NodeIndex>,
  /// Bundles loaded into a separate worker execution context
  worker_bundles: HashSet<NodeIndex>,
  queue: VecDeque<(NodeIndex, NodeIndex)>,
}

impl<'a> BundleGraphBuilder<'a> {
  pub fn new(asset_graph: &'a AssetGraph, options: &SatchelOptions) -> Self {
    BundleGraphBuilder {
      asset_graph,
      source_maps: options.source_maps,
      bundle_graph: BundleGraph::new(),
      consumers: IndexMap::new(),
      boundary_bundles: HashMap::new(),
      isolated_bundles: HashMap::new(),
      typed_companions: HashMap::new(),
      worker_bundles: HashSet::new(),
      queue: VecDeque::new(),
    }
  }

  #[tracing::instrument(level = "info", skip_all)]
  pub fn build(mut self) -> anyhow::Result<BundleGraph> {
    for entry_node in self.asset_graph.entry_dependency_nodes() {
      let asset_node = self
        .asset_graph
        .resolved_asset_node(entry_node)
        .ok_or_else(|| {
          BundlingInvariantViolation(String::from("Entry dependency has no resolved asset"))
        })?;
      let asset = self.expect_asset(asset_node)?;

      let bundle = Bundle {
        id: create_bundle_id(Some(&asset.id), &asset.file_type, 0),
        bundle_type: asset.file_type.clone(),
        entry_asset_id: Some(asset.id.clone()),
        needs_stable_name: true,
        ..Bundle::default()
      };
      let root = self.bundle_graph.root_node();
      let bundle_node = self.bundle_graph.add_bundle(root, bundle);

      self.queue.push_back((asset_node, bundle_node));
    }

    while let Some((asset_node, bundle_node)) = self.queue.pop_front() {
      self.traverse_bundle(asset_node, bundle_node)?;
    }

    self.place_assets()?;
    self.add_map_companions();

    Ok(self.bundle_graph)
  }

  /// Walks the sync-reachable subgraph of one bundle, recording consumers
  /// and creating child bundles at boundaries.
  fn traverse_bundle(&mut self, root: NodeIndex, bundle_node: NodeIndex) -> anyhow::Result<()> {
    let bundle_type = self
      .bundle_graph
      .get_bundle(bundle_node)
      .map(|bundle| bundle.bundle_type.clone())
      .ok_or_else(|| {
        BundlingInvariantViolation(String::from("Traversal reached a non-bundle node"))
      })?;

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![root];

    while let Some(asset_node) = stack.pop() {
      if !visited.insert(asset_node) {
        continue;
      }

      let asset = self.expect_asset(asset_node)?.clone();
      self.record_consumer(&asset.id, bundle_node);

      for dep_node in self.asset_graph.outgoing_dependency_nodes(asset_node) {
        let Some(target_node) = self.asset_graph.resolved_asset_node(dep_node) else {
          continue;
        };
        let Some(dependency) = self.asset_graph.get_dependency(dep_node) else {
          continue;
        };
        let dependency = dependency.clone();
        let target = self.expect_asset(target_node)?.clone();

        if target.bundle_behavior == BundleBehavior::Isolated {
          self.isolated_bundle(&target, bundle_node);
        } else if dependency.priority != Priority::Sync {
          self.boundary_bundle(&target, target_node, bundle_node, &dependency);
        } else if target.file_type != bundle_type {
          self.typed_companion_bundle(&target, target_node, bundle_node);
        } else {
          stack.push(target_node);
        }
      }
    }

    Ok(())
  }

  fn record_consumer(&mut self, asset_id: &AssetId, bundle_node: NodeIndex) {
    let consumers = self.consumers.entry(asset_id.clone()).or_default();
    if !consumers.contains(&bundle_node) {
      consumers.push(bundle_node);
    }
  }

  fn isolated_bundle(&mut self, asset: &Asset, parent: NodeIndex) {
    if let Some(existing) = self.isolated_bundles.get(&asset.id) {
      self.bundle_graph.add_edge(&parent, existing);
      return;
    }

    let bundle = Bundle {
      id: create_bundle_id(Some(&asset.id), &asset.file_type, 0),
      bundle_type: asset.file_type.clone(),
      entry_asset_id: Some(asset.id.clone()),
      asset_ids: vec![asset.id.clone()],
      is_isolated: true,
      ..Bundle::default()
    };
    let bundle_node = self.bundle_graph.add_bundle(parent, bundle);
    self.isolated_bundles.insert(asset.id.clone(), bundle_node);
  }

  fn boundary_bundle(
    &mut self,
    asset: &Asset,
    asset_node: NodeIndex,
    parent: NodeIndex,
    dependency: &Dependency,
  ) {
    if let Some(existing) = self.boundary_bundles.get(&asset.id) {
      self.bundle_graph.add_edge(&parent, existing);
      return;
    }

    let bundle = Bundle {
      id: create_bundle_id(Some(&asset.id), &asset.file_type, 0),
      bundle_type: asset.file_type.clone(),
      entry_asset_id: Some(asset.id.clone()),
      name_hint: dependency.name_hint.clone(),
      ..Bundle::default()
    };
    let bundle_node = self.bundle_graph.add_bundle(parent, bundle);
    self.boundary_bundles.insert(asset.id.clone(), bundle_node);
    if dependency.is_worker {
      self.worker_bundles.insert(bundle_node);
    }
    self.queue.push_back((asset_node, bundle_node));
  }

  fn typed_companion_bundle(&mut self, asset: &Asset, asset_node: NodeIndex, parent: NodeIndex) {
    let key = (parent, asset.file_type.clone());

    if let Some(existing) = self.typed_companions.get(&key) {
      // Further assets of this type from the same consumer join the
      // existing companion bundle
      self.queue.push_back((asset_node, *existing));
      return;
    }

    let bundle = Bundle {
      id: create_bundle_id(Some(&asset.id), &asset.file_type, 0),
      bundle_type: asset.file_type.clone(),
      entry_asset_id: Some(asset.id.clone()),
      needs_stable_name: self
        .bundle_graph
        .get_bundle(parent)
        .is_some_and(|bundle| bundle.needs_stable_name),
      ..Bundle::default()
    };
    let bundle_node = self.bundle_graph.add_bundle(parent, bundle);
    self.typed_companions.insert(key, bundle_node);
    self.queue.push_back((asset_node, bundle_node));
  }

  /// Assigns each consumed asset to bundles: the nearest common ancestor of
  /// all consumers that matches the asset's type when one exists, otherwise
  /// duplicated into each consumer. Bundle root assets always stay in their
  /// own bundle.
  fn place_assets(&mut self) -> anyhow::Result<()> {
    let mut placements: IndexMap<NodeIndex, Vec<AssetId>> = IndexMap::new();
    for bundle_node in self.bundle_graph.all_bundle_nodes() {
      placements.entry(bundle_node).or_default();
    }

    for (asset_id, consumer_bundles) in &self.consumers {
      let file_type = self
        .asset_graph
        .get_asset_by_id(asset_id)
        .map(|asset| asset.file_type.clone())
        .ok_or_else(|| {
          BundlingInvariantViolation(format!("Consumed asset '{asset_id}' is not in the graph"))
        })?;

      let mut targets: Vec<NodeIndex> = Vec::new();

      if let Some(nca) = self.nearest_common_ancestor(consumer_bundles, &file_type) {
        targets.push(nca);
      } else {
        targets.extend(consumer_bundles.iter().copied());
      }

      // A bundle rooted at this asset must contain it to be loadable on
      // its own
      for bundle_node in consumer_bundles {
        let is_root = self
          .bundle_graph
          .get_bundle(*bundle_node)
          .and_then(|bundle| bundle.entry_asset_id.as_ref())
          .is_some_and(|entry_id| entry_id == asset_id);
        if is_root && !targets.contains(bundle_node) {
          targets.push(*bundle_node);
        }
      }

      for bundle_node in targets {
        placements.entry(bundle_node).or_default().push(asset_id.clone());
      }
    }

    for (bundle_node, asset_ids) in placements {
      let ordered = self.topological_order(&asset_ids, bundle_node)?;
      if let Some(bundle) = self.bundle_graph.get_bundle_mut(bundle_node) {
        if !bundle.is_isolated {
          bundle.asset_ids = ordered;
        }
      }
    }

    Ok(())
  }

  /// The hoist candidates for one consumer: its chain of primary ancestors,
  /// cut off at worker bundles. A worker's global context never loads the
  /// bundles above it, so nothing may hoist across that boundary.
  fn placement_chain(&self, bundle: NodeIndex) -> Vec<NodeIndex> {
    let mut chain = Vec::new();
    for node in self.bundle_graph.ancestor_chain(bundle) {
      chain.push(node);
      if self.worker_bundles.contains(&node) {
        break;
      }
    }
    chain
  }

  /// The nearest ancestor shared by every consumer that can hold an asset
  /// of the given type. A script bundle is not a valid home for a
  /// stylesheet, so candidates of a different type are skipped even when
  /// every consumer loads them.
  fn nearest_common_ancestor(
    &self,
    bundles: &[NodeIndex],
    bundle_type: &FileType,
  ) -> Option<NodeIndex> {
    let (first, rest) = bundles.split_first()?;
    let chains: Vec<Vec<NodeIndex>> = rest
      .iter()
      .map(|bundle| self.placement_chain(*bundle))
      .collect();

    self
      .placement_chain(*first)
      .into_iter()
      .filter(|candidate| {
        self
          .bundle_graph
          .get_bundle(*candidate)
          .is_some_and(|bundle| bundle.bundle_type == *bundle_type)
      })
      .find(|candidate| chains.iter().all(|chain| chain.contains(candidate)))
  }

  /// Orders a bundle's assets dependencies-first via post-order traversal
  /// from the bundle root, appending members unreachable from the root
  /// (hoisted assets) in discovery order.
  fn topological_order(
    &self,
    members: &[AssetId],
    bundle_node: NodeIndex,
  ) -> anyhow::Result<Vec<AssetId>> {
    let member_set: HashSet<&AssetId> = members.iter().collect();
    let mut ordered: Vec<AssetId> = Vec::new();
    let mut visited: HashSet<AssetId> = HashSet::new();

    let mut roots: Vec<AssetId> = Vec::new();
    if let Some(entry_id) = self
      .bundle_graph
      .get_bundle(bundle_node)
      .and_then(|bundle| bundle.entry_asset_id.clone())
    {
      if member_set.contains(&entry_id) {
        roots.push(entry_id);
      }
    }
    roots.extend(members.iter().cloned());

    for root in roots {
      self.visit_post_order(&root, &member_set, &mut visited, &mut ordered)?;
    }

    Ok(ordered)
  }

  fn visit_post_order(
    &self,
    asset_id: &AssetId,
    members: &HashSet<&AssetId>,
    visited: &mut HashSet<AssetId>,
    ordered: &mut Vec<AssetId>,
  ) -> anyhow::Result<()> {
    if !members.contains(asset_id) || !visited.insert(asset_id.clone()) {
      return Ok(());
    }

    let Some(asset_node) = self.asset_graph.asset_node_by_id(asset_id) else {
      return Err(
        BundlingInvariantViolation(format!("Placed asset '{asset_id}' is not in the graph"))
          .into(),
      );
    };

    for dep_node in self.asset_graph.outgoing_dependency_nodes(asset_node) {
      let Some(dependency) = self.asset_graph.get_dependency(dep_node) else {
        continue;
      };
      if dependency.priority != Priority::Sync {
        continue;
      }
      let Some(target_node) = self.asset_graph.resolved_asset_node(dep_node) else {
        continue;
      };
      if let Some(target) = self.asset_graph.get_asset(target_node) {
        self.visit_post_order(&target.id.clone(), members, visited, ordered)?;
      }
    }

    ordered.push(asset_id.clone());
    Ok(())
  }

  fn add_map_companions(&mut self) {
    if !self.source_maps {
      return;
    }

    for bundle_node in self.bundle_graph.all_bundle_nodes() {
      let Some(bundle) = self.bundle_graph.get_bundle(bundle_node) else {
        continue;
      };
      if bundle.is_isolated || bundle.bundle_type == FileType::Map {
        continue;
      }

      let map_bundle = Bundle {
        id: create_bundle_id(bundle.entry_asset_id.as_ref(), &FileType::Map, 0),
        bundle_type: FileType::Map,
        entry_asset_id: bundle.entry_asset_id.clone(),
        needs_stable_name: bundle.needs_stable_name,
        ..Bundle::default()
      };
      self.bundle_graph.add_bundle(bundle_node, map_bundle);
    }
  }

  fn expect_asset(&self, asset_node: NodeIndex) -> anyhow::Result<&Asset> {
    self.asset_graph.get_asset(asset_node).ok_or_else(|| {
      BundlingInvariantViolation(String::from("Traversal reached a non-asset node")).into()
    })
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use satchel_core::types::Dependency;
  use std::path::PathBuf;

  use super::*;

  struct GraphFixture {
    graph: AssetGraph,
  }

  impl GraphFixture {
    fn new() -> Self {
      GraphFixture {
        graph: AssetGraph::new(),
      }
    }

    fn asset(path: &str) -> Asset {
      let file_type = FileType::from_extension(
        PathBuf::from(path)
          .extension()
          .and_then(|ext| ext.to_str())
          .unwrap_or(""),
      );
      Asset {
        id: format!("id-{path}"),
        file_path: PathBuf::from(format!("/project/{path}")),
        file_type,
        ..Asset::default()
      }
    }

    fn entry(&mut self, path: &str) -> NodeIndex {
      let dep = self.graph.add_entry_dependency(Dependency::entry(path.to_string()));
      self.graph.add_asset(dep, Self::asset(path))
    }

    fn link(&mut self, from: NodeIndex, path: &str, priority: Priority) -> NodeIndex {
      let source_id = self.graph.get_asset(from).unwrap().id.clone();
      let dep = self.graph.add_dependency(
        from,
        Dependency {
          priority,
          ..Dependency::new(format!("./{path}"), source_id)
        },
      );

      if let Some(existing) = self.graph.asset_node_by_id(&format!("id-{path}")) {
        self.graph.add_edge(&dep, &existing);
        existing
      } else {
        self.graph.add_asset(dep, Self::asset(path))
      }
    }

    fn build(&self, source_maps: bool) -> BundleGraph {
      let options = SatchelOptions {
        source_maps,
        ..SatchelOptions::default()
      };
      BundleGraphBuilder::new(&self.graph, &options).build().unwrap()
    }
  }

  fn bundle_asset_ids(graph: &BundleGraph, node: NodeIndex) -> Vec<String> {
    graph.get_bundle(node).unwrap().asset_ids.clone()
  }

  fn non_map_children(graph: &BundleGraph, node: NodeIndex) -> Vec<NodeIndex> {
    graph
      .children(node)
      .into_iter()
      .filter(|child| graph.get_bundle(*child).unwrap().bundle_type != FileType::Map)
      .collect()
  }

  #[test]
  fn sync_chain_packs_into_one_bundle_dependencies_first() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    fixture.link(index, "local.js", Priority::Sync);

    let graph = fixture.build(false);
    let roots = graph.root_bundle_nodes();

    assert_eq!(roots.len(), 1);
    assert_eq!(
      bundle_asset_ids(&graph, roots[0]),
      vec!["id-local.js", "id-index.js"]
    );
    assert!(graph.children(roots[0]).is_empty());
  }

  #[test]
  fn dynamic_import_creates_a_child_bundle() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    fixture.link(index, "lazy.js", Priority::Lazy);

    let graph = fixture.build(false);
    let roots = graph.root_bundle_nodes();
    let children = graph.children(roots[0]);

    assert_eq!(children.len(), 1);
    assert_eq!(bundle_asset_ids(&graph, roots[0]), vec!["id-index.js"]);
    assert_eq!(bundle_asset_ids(&graph, children[0]), vec!["id-lazy.js"]);
  }

  #[test]
  fn diamond_shared_dependency_hoists_to_the_root_bundle() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    let a = fixture.link(index, "a.js", Priority::Lazy);
    let b = fixture.link(index, "b.js", Priority::Lazy);
    fixture.link(a, "common.js", Priority::Sync);
    fixture.link(b, "common.js", Priority::Sync);

    let graph = fixture.build(false);
    let root = graph.root_bundle_nodes()[0];

    assert_eq!(
      bundle_asset_ids(&graph, root),
      vec!["id-index.js", "id-common.js"]
    );
    for child in graph.children(root) {
      assert!(!bundle_asset_ids(&graph, child).contains(&String::from("id-common.js")));
    }
  }

  #[test]
  fn entries_never_share_assets() {
    let mut fixture = GraphFixture::new();
    let a = fixture.entry("a.js");
    let b = fixture.entry("b.js");
    fixture.link(a, "common.js", Priority::Sync);
    fixture.link(b, "common.js", Priority::Sync);

    let graph = fixture.build(false);
    let roots = graph.root_bundle_nodes();

    assert_eq!(
      bundle_asset_ids(&graph, roots[0]),
      vec!["id-common.js", "id-a.js"]
    );
    assert_eq!(
      bundle_asset_ids(&graph, roots[1]),
      vec!["id-common.js", "id-b.js"]
    );
  }

  #[test]
  fn stylesheets_split_into_a_typed_companion_bundle() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    fixture.link(index, "a.css", Priority::Sync);
    fixture.link(index, "b.css", Priority::Sync);

    let graph = fixture.build(false);
    let root = graph.root_bundle_nodes()[0];
    let children = non_map_children(&graph, root);

    assert_eq!(children.len(), 1);
    let css_bundle = graph.get_bundle(children[0]).unwrap();
    assert_eq!(css_bundle.bundle_type, FileType::Css);
    assert_eq!(css_bundle.asset_ids, vec!["id-a.css", "id-b.css"]);
  }

  #[test]
  fn isolated_assets_get_their_own_leaf_bundle() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    let raw = fixture.link(index, "logo.png", Priority::Sync);
    let raw_index = fixture.graph.asset_index(raw).unwrap();
    fixture.graph.assets[raw_index].asset.bundle_behavior = BundleBehavior::Isolated;

    let graph = fixture.build(false);
    let root = graph.root_bundle_nodes()[0];
    let children = graph.children(root);

    assert_eq!(children.len(), 1);
    let leaf = graph.get_bundle(children[0]).unwrap();
    assert!(leaf.is_isolated);
    assert_eq!(leaf.asset_ids, vec!["id-logo.png"]);
    assert_eq!(bundle_asset_ids(&graph, root), vec!["id-index.js"]);
  }

  #[test]
  fn worker_dependencies_start_parallel_child_bundles() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    let source_id = fixture.graph.get_asset(index).unwrap().id.clone();
    let dep = fixture.graph.add_dependency(
      index,
      Dependency {
        priority: Priority::Parallel,
        is_worker: true,
        ..Dependency::new(String::from("./worker.js"), source_id)
      },
    );
    fixture.graph.add_asset(dep, GraphFixture::asset("worker.js"));

    let graph = fixture.build(false);
    let root = graph.root_bundle_nodes()[0];
    let children = graph.children(root);

    assert_eq!(children.len(), 1);
    assert_eq!(bundle_asset_ids(&graph, children[0]), vec!["id-worker.js"]);
  }

  #[test]
  fn stylesheets_shared_across_bundles_stay_in_css_bundles() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    let lazy = fixture.link(index, "lazy.js", Priority::Lazy);
    fixture.link(index, "style.css", Priority::Sync);
    fixture.link(lazy, "style.css", Priority::Sync);

    let graph = fixture.build(false);
    let root = graph.root_bundle_nodes()[0];

    // The entry bundle shares an ancestor with both css bundles, but a
    // script bundle never takes the stylesheet
    assert_eq!(bundle_asset_ids(&graph, root), vec!["id-index.js"]);

    let css_bundles: Vec<&Bundle> = graph
      .bundles
      .iter()
      .filter(|bundle| bundle.bundle_type == FileType::Css)
      .collect();
    assert_eq!(css_bundles.len(), 2);
    for bundle in css_bundles {
      assert_eq!(bundle.asset_ids, vec!["id-style.css"]);
    }
  }

  #[test]
  fn worker_shared_assets_are_duplicated_into_the_worker_bundle() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    fixture.link(index, "shared.js", Priority::Sync);
    let source_id = fixture.graph.get_asset(index).unwrap().id.clone();
    let dep = fixture.graph.add_dependency(
      index,
      Dependency {
        priority: Priority::Parallel,
        is_worker: true,
        ..Dependency::new(String::from("./worker.js"), source_id)
      },
    );
    let worker = fixture.graph.add_asset(dep, GraphFixture::asset("worker.js"));
    fixture.link(worker, "shared.js", Priority::Sync);

    let graph = fixture.build(false);
    let root = graph.root_bundle_nodes()[0];
    let worker_bundle = graph.children(root)[0];

    // The worker never loads the page bundle, so the shared module lives
    // in both
    assert!(bundle_asset_ids(&graph, root).contains(&String::from("id-shared.js")));
    assert!(bundle_asset_ids(&graph, worker_bundle).contains(&String::from("id-shared.js")));
  }

  #[test]
  fn source_maps_add_one_map_child_per_bundle() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    fixture.link(index, "lazy.js", Priority::Lazy);

    let graph = fixture.build(true);
    let map_bundles: Vec<&Bundle> = graph
      .bundles
      .iter()
      .filter(|bundle| bundle.bundle_type == FileType::Map)
      .collect();

    // One for the entry bundle, one for the lazy bundle
    assert_eq!(map_bundles.len(), 2);
  }

  #[test]
  fn rebundling_is_idempotent() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js");
    let a = fixture.link(index, "a.js", Priority::Lazy);
    fixture.link(a, "common.js", Priority::Sync);
    fixture.link(index, "style.css", Priority::Sync);

    let first = fixture.build(true);
    let second = fixture.build(true);

    let ids = |graph: &BundleGraph| -> Vec<(String, Vec<String>)> {
      graph
        .bundles
        .iter()
        .map(|bundle| (bundle.id.clone(), bundle.asset_ids.clone()))
        .collect()
    };

    assert_eq!(ids(&first), ids(&second));
  }
}
