use std::path::PathBuf;
use std::sync::Arc;

use satchel_core::asset_graph::AssetGraph;
use satchel_core::bundle_graph::BundleGraph;
use satchel_core::types::SatchelOptions;
use satchel_filesystem::FileSystemRef;

use crate::asset_graph_builder::AssetGraphBuilder;
use crate::bundler::BundleGraphBuilder;
use crate::environment::Environment;
use crate::packager::{PackagedBundle, Packager};
use crate::plugins::PluginRegistry;
use crate::transform_cache::TransformCache;

/// The output of one completed build.
#[derive(Debug)]
pub struct BuildResult {
  pub asset_graph: AssetGraph,
  pub bundle_graph: BundleGraph,
  pub outputs: Vec<PackagedBundle>,
}

/// The bundler entry point. Holds the plugin registry and transform cache
/// across builds so unchanged assets are not re-transformed.
pub struct Satchel {
  fs: FileSystemRef,
  options: SatchelOptions,
  project_root: PathBuf,
  plugins: Arc<PluginRegistry>,
  cache: Arc<TransformCache>,
}

impl Satchel {
  pub fn new(fs: FileSystemRef, options: SatchelOptions) -> anyhow::Result<Self> {
    let project_root = fs.cwd()?;

    Ok(Satchel {
      fs,
      options,
      project_root,
      plugins: Arc::new(PluginRegistry::default()),
      cache: Arc::new(TransformCache::new()),
    })
  }

  /// Runs the full pipeline: asset graph, bundle tree, packaging, output.
  /// Artifacts are only written once every bundle has packaged, so a
  /// failed build leaves no partial output.
  #[tracing::instrument(level = "info", skip_all)]
  pub async fn build(&self) -> anyhow::Result<BuildResult> {
    let environment = Environment::new(&self.options, &self.fs)?;

    let builder = AssetGraphBuilder::new(
      self.fs.clone(),
      self.options.clone(),
      self.project_root.clone(),
      self.plugins.clone(),
      self.cache.clone(),
    );
    let asset_graph = tokio::task::spawn_blocking(move || builder.build()).await??;

    let mut bundle_graph = BundleGraphBuilder::new(&asset_graph, &self.options).build()?;

    let packager = Packager::new(
      &asset_graph,
      &self.options,
      self.project_root.clone(),
      environment,
    );
    let outputs = packager.package_all(&mut bundle_graph)?;

    let out_dir = if self.options.out_dir.is_absolute() {
      self.options.out_dir.clone()
    } else {
      self.project_root.join(&self.options.out_dir)
    };
    self.fs.create_dir_all(&out_dir)?;
    for output in &outputs {
      self.fs.write(&out_dir.join(&output.name), &output.contents)?;
    }

    tracing::info!(bundles = outputs.len(), "Build finished");

    Ok(BuildResult {
      asset_graph,
      bundle_graph,
      outputs,
    })
  }
}
