use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use anyhow::anyhow;
use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use satchel_core::asset_graph::{AssetGraph, DependencyState};
use satchel_core::hash::IdentifierHasher;
use satchel_core::plugin::TransformResult;
use satchel_core::types::{Asset, BuildMode, Dependency, SatchelOptions};
use satchel_filesystem::FileSystemRef;
use satchel_resolver::{Resolution, Resolver, ResolverConfig};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::plugins::PluginRegistry;
use crate::transform_cache::{transform_cache_key, TransformCache};

type ResultSender = Sender<anyhow::Result<(Arc<TransformResult>, u64)>>;
type ResultReceiver = Receiver<anyhow::Result<(Arc<TransformResult>, u64)>>;

/// Builds the asset graph to a fixpoint: resolve specifiers, dispatch
/// transform jobs onto the runtime, apply completed results and enqueue the
/// dependencies they discover.
///
/// All graph mutation happens on the single coordinating thread; worker
/// jobs only read files and run transformer plugins. Each resolved path is
/// requested once per build regardless of fan-in, and dependencies arriving
/// while a transform is in flight wait on `waiting_asset_requests`.
pub struct AssetGraphBuilder {
  fs: FileSystemRef,
  options: SatchelOptions,
  project_root: PathBuf,
  resolver: Resolver,
  plugins: Arc<PluginRegistry>,
  cache: Arc<TransformCache>,
  config_fingerprint: u64,
  handle: Handle,
  concurrency: Arc<Semaphore>,
  graph: AssetGraph,
  work_count: u32,
  visited: HashSet<u64>,
  request_to_dep_node: HashMap<u64, NodeIndex>,
  request_to_asset_node: HashMap<u64, NodeIndex>,
  waiting_asset_requests: HashMap<u64, HashSet<NodeIndex>>,
  sender: ResultSender,
  receiver: ResultReceiver,
}

fn asset_request_id(path: &Path) -> u64 {
  let mut hasher = IdentifierHasher::default();
  path.hash(&mut hasher);
  hasher.finish()
}

fn config_fingerprint(options: &SatchelOptions) -> u64 {
  let mut hasher = IdentifierHasher::default();
  matches!(options.mode, BuildMode::Production).hash(&mut hasher);
  hasher.finish()
}

impl AssetGraphBuilder {
  pub fn new(
    fs: FileSystemRef,
    options: SatchelOptions,
    project_root: PathBuf,
    plugins: Arc<PluginRegistry>,
    cache: Arc<TransformCache>,
  ) -> Self {
    let (sender, receiver) = channel();
    let config_fingerprint = config_fingerprint(&options);

    AssetGraphBuilder {
      resolver: Resolver::new(fs.clone(), ResolverConfig::default()),
      fs,
      options,
      project_root,
      plugins,
      cache,
      config_fingerprint,
      handle: Handle::current(),
      concurrency: Arc::new(Semaphore::new(num_cpus::get())),
      graph: AssetGraph::new(),
      work_count: 0,
      visited: HashSet::new(),
      request_to_dep_node: HashMap::new(),
      request_to_asset_node: HashMap::new(),
      waiting_asset_requests: HashMap::new(),
      sender,
      receiver,
    }
  }

  /// Runs the coordinator loop to completion. Blocks the calling thread;
  /// run it via `spawn_blocking` from async contexts.
  #[tracing::instrument(level = "info", skip_all)]
  pub fn build(mut self) -> anyhow::Result<AssetGraph> {
    let mut failure: Option<anyhow::Error> = None;

    for entry in self.options.entries.clone() {
      let dependency = Dependency::entry(entry);
      let node = self.graph.add_entry_dependency(dependency.clone());

      if let Err(err) = self.resolve_and_request(&dependency, node) {
        failure = Some(err);
        break;
      }
    }

    // On failure, drain in-flight work before surfacing the error so no
    // worker job outlives the build
    while self.work_count > 0 {
      let Ok(message) = self.receiver.recv() else {
        break;
      };

      self.work_count -= 1;

      match message {
        Ok((result, request_id)) if failure.is_none() => {
          tracing::debug!(
            file_path = %result.asset.file_path.display(),
            "Applying transform result"
          );
          if let Err(err) = self.handle_transform_result(result, request_id) {
            failure = Some(err);
          }
        }
        Ok(_) => {}
        Err(err) => {
          if failure.is_none() {
            failure = Some(err);
          }
        }
      }
    }

    match failure {
      Some(err) => Err(err),
      None => Ok(self.graph),
    }
  }

  fn resolve_and_request(
    &mut self,
    dependency: &Dependency,
    dep_node: NodeIndex,
  ) -> anyhow::Result<()> {
    let from = self.resolve_base(dependency);
    let specifier = entry_specifier(dependency);

    match self.resolver.resolve(&specifier, &from) {
      Ok(Resolution::Path(path)) => {
        self
          .graph
          .set_dependency_state(dep_node, DependencyState::Resolved);
        self.request_asset(path, dep_node);
        Ok(())
      }
      Ok(Resolution::Excluded) => {
        self
          .graph
          .set_dependency_state(dep_node, DependencyState::Excluded);
        Ok(())
      }
      Err(error) => {
        if dependency.is_optional {
          tracing::warn!(
            specifier = %dependency.specifier,
            from = %from.display(),
            "Skipping unresolved optional dependency"
          );
          self
            .graph
            .set_dependency_state(dep_node, DependencyState::Excluded);
          Ok(())
        } else {
          Err(anyhow::Error::new(error))
        }
      }
    }
  }

  /// The file a dependency's specifier is resolved against. Entries resolve
  /// against the project root.
  fn resolve_base(&self, dependency: &Dependency) -> PathBuf {
    dependency
      .resolve_from
      .clone()
      .or_else(|| {
        let source_asset_id = dependency.source_asset_id.as_ref()?;
        let asset = self.graph.get_asset_by_id(source_asset_id)?;
        Some(asset.file_path.clone())
      })
      .unwrap_or_else(|| self.project_root.join("index"))
  }

  fn request_asset(&mut self, path: PathBuf, dep_node: NodeIndex) {
    let request_id = asset_request_id(&path);

    if self.visited.insert(request_id) {
      self.request_to_dep_node.insert(request_id, dep_node);
      self.work_count += 1;
      self.spawn_transform(path, request_id);
    } else if let Some(asset_node) = self.request_to_asset_node.get(&request_id) {
      // The asset already exists, only an edge is needed
      self.graph.add_edge(&dep_node, asset_node);
    } else {
      // The transform is in flight; connect this dependency when it lands
      self
        .waiting_asset_requests
        .entry(request_id)
        .or_default()
        .insert(dep_node);
    }
  }

  fn spawn_transform(&self, path: PathBuf, request_id: u64) {
    let fs = self.fs.clone();
    let project_root = self.project_root.clone();
    let plugins = self.plugins.clone();
    let cache = self.cache.clone();
    let concurrency = self.concurrency.clone();
    let config_fingerprint = self.config_fingerprint;
    let sender = self.sender.clone();

    self.handle.spawn(async move {
      let result = async {
        let _permit = concurrency.acquire_owned().await?;

        let asset = Asset::new(path, &fs, &project_root)?;
        let plugin = plugins.transformer(&asset.file_type);
        let key = transform_cache_key(&asset, plugin.id(), config_fingerprint);

        cache.get_or_transform(key, plugin, asset).await
      }
      .await;

      // The coordinator only drops the receiver once work_count is zero
      let _ = sender.send(result.map(|result| (result, request_id)));
    });
  }

  fn handle_transform_result(
    &mut self,
    result: Arc<TransformResult>,
    request_id: u64,
  ) -> anyhow::Result<()> {
    let dep_node = *self
      .request_to_dep_node
      .get(&request_id)
      .ok_or_else(|| anyhow!("No dependency node recorded for request {request_id}"))?;

    let asset = result.asset.clone();
    let asset_node = self.graph.add_asset(dep_node, asset.clone());
    self.request_to_asset_node.insert(request_id, asset_node);

    let mut dependencies = result.dependencies.clone();
    if let Some(delegate) = &self.options.delegate {
      for implicit in delegate.get_implicit_dependencies(&asset).unwrap_or_default() {
        dependencies.push(Dependency {
          specifier: implicit.name.to_string_lossy().into_owned(),
          source_asset_id: Some(asset.id.clone()),
          resolve_from: Some(asset.file_path.clone()),
          ..Dependency::default()
        });
      }
    }

    // The same module referenced twice in one file is one dependency
    let mut unique_deps: IndexMap<String, Dependency> = IndexMap::new();
    for dependency in dependencies {
      unique_deps.entry(dependency.id()).or_insert(dependency);
    }

    for (_id, dependency) in unique_deps {
      let node = self.graph.add_dependency(asset_node, dependency.clone());
      self.resolve_and_request(&dependency, node)?;
    }

    if let Some(waiting) = self.waiting_asset_requests.remove(&request_id) {
      for waiting_dep in waiting {
        self.graph.add_edge(&waiting_dep, &asset_node);
      }
    }

    Ok(())
  }
}

/// Entry specifiers are project-root-relative file paths; resolve them the
/// way a relative import written at the root would be.
fn entry_specifier(dependency: &Dependency) -> String {
  if dependency.is_entry
    && !dependency.specifier.starts_with('.')
    && !Path::new(&dependency.specifier).is_absolute()
  {
    format!("./{}", dependency.specifier)
  } else {
    dependency.specifier.clone()
  }
}
