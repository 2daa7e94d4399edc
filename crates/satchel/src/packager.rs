use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use petgraph::graph::NodeIndex;
use regex::{NoExpand, Regex};
use satchel_core::asset_graph::AssetGraph;
use satchel_core::bundle_graph::BundleGraph;
use satchel_core::diagnostic::BundlingInvariantViolation;
use satchel_core::hash::content_hash;
use satchel_core::plugin::OptimizerPlugin;
use satchel_core::types::{
  Asset, AssetId, Bundle, BundleBehavior, BundleId, BuildMode, Dependency, FileType, Priority,
  SatchelOptions,
};
use std::sync::Arc;

use crate::environment::Environment;
use crate::optimizer::SatchelOptimizerPlugin;

static GLOBAL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\bglobal\b").unwrap_or_else(|err| panic!("invalid global pattern: {err}"))
});
static CSS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"@import\s+(?:url\(\s*)?["'][^"']+["']\s*\)?\s*;\s*"#)
    .unwrap_or_else(|err| panic!("invalid css import pattern: {err}"))
});

/// One packaged output artifact, ready to be written under `out_dir`.
#[derive(Clone, Debug, PartialEq)]
pub struct PackagedBundle {
  pub bundle_id: BundleId,
  pub name: String,
  pub contents: Vec<u8>,
}

/// Concatenates each bundle's modules into a self-registering artifact.
///
/// Script bundles wrap every module in a registration against the shared
/// `globalThis.satchelRequire` runtime, so a bundle loaded later can
/// require modules hoisted into an ancestor. Bundles are packaged children
/// first because parents embed child filenames in loader calls.
/// Environment substitution, globals injection and the production
/// optimizer all run here, on the final module code.
pub struct Packager<'a> {
  asset_graph: &'a AssetGraph,
  options: &'a SatchelOptions,
  project_root: PathBuf,
  environment: Environment,
  optimizer: Option<Box<dyn OptimizerPlugin>>,
}

impl<'a> Packager<'a> {
  pub fn new(
    asset_graph: &'a AssetGraph,
    options: &'a SatchelOptions,
    project_root: PathBuf,
    environment: Environment,
  ) -> Self {
    let optimizer: Option<Box<dyn OptimizerPlugin>> = match options.mode {
      BuildMode::Production => Some(Box::new(SatchelOptimizerPlugin::new())),
      BuildMode::Development => None,
    };

    Packager {
      asset_graph,
      options,
      project_root,
      environment,
      optimizer,
    }
  }

  /// Packages every bundle and assigns final output names. Nothing is
  /// written to disk here; a failed package leaves no partial output.
  #[tracing::instrument(level = "info", skip_all)]
  pub fn package_all(&self, bundle_graph: &mut BundleGraph) -> anyhow::Result<Vec<PackagedBundle>> {
    let order = post_order(bundle_graph);

    let mut names: HashMap<NodeIndex, String> = HashMap::new();
    let mut bodies: HashMap<NodeIndex, Vec<u8>> = HashMap::new();

    for node in &order {
      let Some(bundle) = bundle_graph.get_bundle(*node) else {
        continue;
      };
      if bundle.bundle_type == FileType::Map {
        continue;
      }

      let contents = if bundle.is_isolated {
        self.package_isolated(bundle)?
      } else if bundle.bundle_type == FileType::Css {
        self.package_stylesheet(bundle)?
      } else {
        self.package_script(bundle, *node, bundle_graph, &names)?
      };

      let name = self.bundle_name(bundle, &contents)?;
      names.insert(*node, name);
      bodies.insert(*node, contents);
    }

    // Source map companions reference their parent's final name, and the
    // parent gains a trailing sourceMappingURL comment
    for node in &order {
      let Some(bundle) = bundle_graph.get_bundle(*node) else {
        continue;
      };
      if bundle.bundle_type == FileType::Map || bundle.is_isolated {
        continue;
      }
      let Some(map_node) = map_child(bundle_graph, *node) else {
        continue;
      };
      let Some(parent_name) = names.get(node).cloned() else {
        continue;
      };

      let map_name = format!("{parent_name}.map");
      let map_contents = self.render_source_map(bundle, &parent_name)?;

      if let Some(body) = bodies.get_mut(node) {
        body.extend_from_slice(source_map_footer(&bundle.bundle_type, &map_name).as_bytes());
      }

      names.insert(map_node, map_name);
      bodies.insert(map_node, map_contents);
    }

    let mut outputs = Vec::new();
    for node in &order {
      let (Some(name), Some(contents)) = (names.get(node), bodies.get(node)) else {
        continue;
      };
      if let Some(bundle) = bundle_graph.get_bundle_mut(*node) {
        bundle.name = Some(name.clone());
        outputs.push(PackagedBundle {
          bundle_id: bundle.id.clone(),
          name: name.clone(),
          contents: contents.clone(),
        });
      }
    }

    Ok(outputs)
  }

  fn package_isolated(&self, bundle: &Bundle) -> anyhow::Result<Vec<u8>> {
    let asset = self.expect_asset(bundle.asset_ids.first().ok_or_else(|| {
      BundlingInvariantViolation(String::from("Isolated bundle has no asset"))
    })?)?;

    Ok(asset.code.bytes().to_vec())
  }

  fn package_stylesheet(&self, bundle: &Bundle) -> anyhow::Result<Vec<u8>> {
    let mut sheets = Vec::new();

    for asset_id in &bundle.asset_ids {
      let asset = self.expect_asset(asset_id)?;
      // Imported sheets are concatenated into this bundle, so the @import
      // statements themselves are dropped
      let code = CSS_IMPORT_RE
        .replace_all(asset.code.as_str()?, "")
        .trim()
        .to_string();
      if !code.is_empty() {
        sheets.push(code);
      }
    }

    let mut contents = sheets.join("\n");
    contents.push('\n');
    Ok(contents.into_bytes())
  }

  fn package_script(
    &self,
    bundle: &Bundle,
    bundle_node: NodeIndex,
    bundle_graph: &BundleGraph,
    names: &HashMap<NodeIndex, String>,
  ) -> anyhow::Result<Vec<u8>> {
    // Already-packaged bundles by their root asset, for loader rewrites
    let mut bundle_names: HashMap<AssetId, String> = HashMap::new();
    for node in bundle_graph.all_bundle_nodes() {
      let (Some(child), Some(name)) = (bundle_graph.get_bundle(node), names.get(&node)) else {
        continue;
      };
      if let Some(entry_id) = &child.entry_asset_id {
        bundle_names.insert(entry_id.clone(), name.clone());
      }
    }

    let mut registrations: Vec<String> = Vec::new();
    let mut shims: Vec<(AssetId, String)> = Vec::new();
    let mut shimmed: HashSet<AssetId> = HashSet::new();

    for asset_id in &bundle.asset_ids {
      let asset = self.expect_asset(asset_id)?;
      let mut code = self.environment.substitute(asset.code.as_str()?);
      code = self.inject_globals(code, asset);

      let mut specifier_map = serde_json::Map::new();

      for (dependency, target) in self.dependencies_of(asset_id) {
        match (&dependency.priority, target) {
          (Priority::Sync, None) => {
            // Excluded: requiring it yields an empty module
            specifier_map.insert(dependency.specifier.clone(), serde_json::Value::Null);
          }
          (Priority::Sync, Some(target)) => {
            if target.bundle_behavior == BundleBehavior::Isolated {
              let url = self.asset_url(&target.id, &bundle_names)?;
              if shimmed.insert(target.id.clone()) {
                shims.push((target.id.clone(), url));
              }
              specifier_map.insert(
                dependency.specifier.clone(),
                serde_json::Value::String(target.id.clone()),
              );
            } else if target.file_type == bundle.bundle_type {
              specifier_map.insert(
                dependency.specifier.clone(),
                serde_json::Value::String(target.id.clone()),
              );
            } else {
              // Loaded through its own typed bundle, not the registry
              specifier_map.insert(dependency.specifier.clone(), serde_json::Value::Null);
            }
          }
          (Priority::Lazy, Some(target)) => {
            let name = self.boundary_bundle_name(&target.id, &bundle_names)?;
            code = rewrite_dynamic_import(&code, &dependency.specifier, &name, &target.id)?;
          }
          (Priority::Parallel, Some(target)) => {
            let name = self.boundary_bundle_name(&target.id, &bundle_names)?;
            let url = format!("{}/{}", self.options.public_url, name);
            code = rewrite_worker(&code, &dependency.specifier, &url)?;
          }
          (_, None) => {}
        }
      }

      registrations.push(render_registration(
        asset_id,
        &code,
        &serde_json::Value::Object(specifier_map),
      ));
    }

    for (asset_id, url) in shims {
      let code = format!("module.exports = {};", serde_json::Value::String(url));
      registrations.push(render_registration(
        &asset_id,
        &code,
        &serde_json::Value::Object(serde_json::Map::new()),
      ));
    }

    let registry = format!("{{{}\n}}", registrations.join(","));
    let mut body = self.render_bundle(&registry, bundle.entry_asset_id.as_deref());

    if let Some(optimizer) = &self.optimizer {
      body = optimizer.optimize(bundle, body)?;
    }

    Ok(body.into_bytes())
  }

  /// The shared runtime prelude plus this bundle's module registrations.
  fn render_bundle(&self, registry: &str, entry_id: Option<&str>) -> String {
    let entry = entry_id
      .map(|id| format!("\"{id}\""))
      .unwrap_or_else(|| String::from("null"));
    let public_url = &self.options.public_url;

    format!(
      r#"(function (modules, entryId) {{
  var runtime = globalThis.satchelRequire;
  if (!runtime) {{
    runtime = globalThis.satchelRequire = {{
      modules: {{}},
      cache: {{}},
      publicUrl: "{public_url}",
      require: function (id) {{
        var cached = runtime.cache[id];
        if (cached) {{
          return cached.exports;
        }}
        var entry = runtime.modules[id];
        if (!entry) {{
          throw new Error("Cannot find module '" + id + "'");
        }}
        var module = {{ exports: {{}} }};
        runtime.cache[id] = module;
        var localRequire = function (specifier) {{
          var mapped = entry[1][specifier];
          if (mapped === null) {{
            return {{}};
          }}
          return runtime.require(mapped === undefined ? specifier : mapped);
        }};
        entry[0].call(module.exports, localRequire, module, module.exports);
        return module.exports;
      }},
      loadBundle: function (name, id) {{
        return new Promise(function (resolve, reject) {{
          var script = document.createElement("script");
          script.src = runtime.publicUrl + "/" + name;
          script.onload = function () {{
            resolve(runtime.require(id));
          }};
          script.onerror = reject;
          document.head.appendChild(script);
        }});
      }}
    }};
  }}
  for (var id in modules) {{
    runtime.modules[id] = modules[id];
  }}
  if (entryId) {{
    runtime.require(entryId);
  }}
}})({registry}, {entry});
"#
    )
  }

  fn render_source_map(&self, bundle: &Bundle, bundle_name: &str) -> anyhow::Result<Vec<u8>> {
    let sources: Vec<String> = bundle
      .asset_ids
      .iter()
      .filter_map(|id| self.asset_graph.get_asset_by_id(id))
      .map(|asset| self.project_relative(&asset.file_path))
      .collect();

    let map = serde_json::json!({
      "version": 3,
      "file": bundle_name,
      "sources": sources,
      "names": [],
      "mappings": "",
    });

    Ok(serde_json::to_vec(&map)?)
  }

  fn bundle_name(&self, bundle: &Bundle, contents: &[u8]) -> anyhow::Result<String> {
    let extension = bundle.bundle_type.extension();

    if bundle.needs_stable_name {
      let entry_id = bundle.entry_asset_id.as_ref().ok_or_else(|| {
        BundlingInvariantViolation(String::from("Stable-name bundle has no entry asset"))
      })?;
      let asset = self.expect_asset(entry_id)?;
      let stem = asset
        .file_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("bundle");
      Ok(format!("{stem}.{extension}"))
    } else {
      let hash = content_hash(contents);
      Ok(match &bundle.name_hint {
        Some(hint) => format!("{hint}.{hash}.{extension}"),
        None => format!("{hash}.{extension}"),
      })
    }
  }

  fn inject_globals(&self, code: String, asset: &Asset) -> String {
    let mut prelude = String::new();

    if code.contains("__filename") || code.contains("__dirname") {
      let relative = self.project_relative(&asset.file_path);
      let dirname = Path::new(&relative)
        .parent()
        .map(|parent| parent.to_string_lossy().into_owned())
        .filter(|parent| !parent.is_empty())
        .unwrap_or_else(|| String::from("."));

      prelude.push_str(&format!(
        "var __filename = {};\nvar __dirname = {};\n",
        serde_json::Value::String(relative),
        serde_json::Value::String(dirname),
      ));
    }

    if GLOBAL_RE.is_match(&code) {
      prelude.push_str("var global = globalThis;\n");
    }

    if prelude.is_empty() {
      code
    } else {
      format!("{prelude}{code}")
    }
  }

  fn project_relative(&self, path: &Path) -> String {
    path
      .strip_prefix(&self.project_root)
      .unwrap_or(path)
      .to_string_lossy()
      .into_owned()
  }

  /// The public url a raw asset is served from.
  fn asset_url(
    &self,
    asset_id: &AssetId,
    bundle_names: &HashMap<AssetId, String>,
  ) -> anyhow::Result<String> {
    let name = self.boundary_bundle_name(asset_id, bundle_names)?;
    Ok(format!("{}/{}", self.options.public_url, name))
  }

  fn boundary_bundle_name(
    &self,
    asset_id: &AssetId,
    bundle_names: &HashMap<AssetId, String>,
  ) -> anyhow::Result<String> {
    bundle_names.get(asset_id).cloned().ok_or_else(|| {
      BundlingInvariantViolation(format!(
        "No packaged bundle found for boundary asset '{asset_id}'"
      ))
      .into()
    })
  }

  fn dependencies_of(&self, asset_id: &AssetId) -> Vec<(Arc<Dependency>, Option<&Asset>)> {
    let Some(asset_node) = self.asset_graph.asset_node_by_id(asset_id) else {
      return Vec::new();
    };

    self
      .asset_graph
      .outgoing_dependency_nodes(asset_node)
      .into_iter()
      .filter_map(|dep_node| {
        let dependency = self.asset_graph.get_dependency(dep_node)?.clone();
        let target = self
          .asset_graph
          .resolved_asset_node(dep_node)
          .and_then(|node| self.asset_graph.get_asset(node));
        Some((dependency, target))
      })
      .collect()
  }

  fn expect_asset(&self, asset_id: &AssetId) -> anyhow::Result<&Asset> {
    self.asset_graph.get_asset_by_id(asset_id).ok_or_else(|| {
      BundlingInvariantViolation(format!("Packaged asset '{asset_id}' is not in the graph")).into()
    })
  }
}

fn render_registration(asset_id: &AssetId, code: &str, specifier_map: &serde_json::Value) -> String {
  format!(
    "\n\"{asset_id}\": [function (require, module, exports) {{\n{code}\n}}, {specifier_map}]"
  )
}

fn rewrite_dynamic_import(
  code: &str,
  specifier: &str,
  bundle_name: &str,
  target_id: &str,
) -> anyhow::Result<String> {
  let pattern = Regex::new(&format!(
    r#"\bimport\s*\(\s*["']{}["']\s*\)"#,
    regex::escape(specifier)
  ))?;
  let replacement =
    format!(r#"globalThis.satchelRequire.loadBundle("{bundle_name}", "{target_id}")"#);

  Ok(pattern.replace_all(code, NoExpand(&replacement)).into_owned())
}

fn rewrite_worker(code: &str, specifier: &str, url: &str) -> anyhow::Result<String> {
  let escaped = regex::escape(specifier);

  let worker = Regex::new(&format!(r#"\bnew\s+Worker\s*\(\s*["']{escaped}["']"#))?;
  let replacement = format!(r#"new Worker("{url}""#);
  let code = worker.replace_all(code, NoExpand(&replacement)).into_owned();

  let register = Regex::new(&format!(
    r#"serviceWorker\s*\.\s*register\s*\(\s*["']{escaped}["']"#
  ))?;
  let replacement = format!(r#"serviceWorker.register("{url}""#);
  Ok(register.replace_all(&code, NoExpand(&replacement)).into_owned())
}

fn source_map_footer(bundle_type: &FileType, map_name: &str) -> String {
  match bundle_type {
    FileType::Css => format!("/*# sourceMappingURL={map_name} */\n"),
    _ => format!("//# sourceMappingURL={map_name}\n"),
  }
}

fn map_child(bundle_graph: &BundleGraph, node: NodeIndex) -> Option<NodeIndex> {
  bundle_graph.children(node).into_iter().find(|child| {
    bundle_graph
      .get_bundle(*child)
      .is_some_and(|bundle| bundle.bundle_type == FileType::Map)
  })
}

/// Bundle nodes with every child ordered before its parents.
fn post_order(bundle_graph: &BundleGraph) -> Vec<NodeIndex> {
  let mut visited: HashSet<NodeIndex> = HashSet::new();
  let mut ordered: Vec<NodeIndex> = Vec::new();

  fn visit(
    bundle_graph: &BundleGraph,
    node: NodeIndex,
    visited: &mut HashSet<NodeIndex>,
    ordered: &mut Vec<NodeIndex>,
  ) {
    if !visited.insert(node) {
      return;
    }
    for child in bundle_graph.children(node) {
      visit(bundle_graph, child, visited, ordered);
    }
    ordered.push(node);
  }

  for root in bundle_graph.root_bundle_nodes() {
    visit(bundle_graph, root, &mut visited, &mut ordered);
  }

  ordered
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use pretty_assertions::assert_eq;
  use satchel_core::types::BuildMode;
  use satchel_filesystem::{FileSystemRef, InMemoryFileSystem};

  use crate::bundler::BundleGraphBuilder;

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

    fn asset(path: &str, code: &str) -> Asset {
      let file_type = FileType::from_extension(
        Path::new(path)
          .extension()
          .and_then(|ext| ext.to_str())
          .unwrap_or(""),
      );
      Asset {
        id: format!("id-{path}"),
        file_path: PathBuf::from(format!("/project/{path}")),
        file_type,
        code: code.into(),
        ..Asset::default()
      }
    }

    fn entry(&mut self, path: &str, code: &str) -> NodeIndex {
      let dep = self
        .graph
        .add_entry_dependency(Dependency::entry(path.to_string()));
      self.graph.add_asset(dep, Self::asset(path, code))
    }

    fn link(
      &mut self,
      from: NodeIndex,
      specifier: &str,
      path: &str,
      code: &str,
      priority: Priority,
    ) -> NodeIndex {
      let source_id = self.graph.get_asset(from).unwrap().id.clone();
      let dep = self.graph.add_dependency(
        from,
        Dependency {
          priority,
          ..Dependency::new(specifier.to_string(), source_id)
        },
      );
      self.graph.add_asset(dep, Self::asset(path, code))
    }

    fn mark_isolated(&mut self, node: NodeIndex) {
      let idx = self.graph.asset_index(node).unwrap();
      self.graph.assets[idx].asset.bundle_behavior = BundleBehavior::Isolated;
    }

    fn package(&self, options: &SatchelOptions) -> (BundleGraph, Vec<PackagedBundle>) {
      let mut bundle_graph = BundleGraphBuilder::new(&self.graph, options).build().unwrap();
      let fs: FileSystemRef = std::sync::Arc::new(InMemoryFileSystem::default());
      let environment = Environment::new(options, &fs).unwrap();
      let packager = Packager::new(&self.graph, options, PathBuf::from("/project"), environment);
      let outputs = packager.package_all(&mut bundle_graph).unwrap();
      (bundle_graph, outputs)
    }
  }

  fn no_maps() -> SatchelOptions {
    SatchelOptions {
      source_maps: false,
      ..SatchelOptions::default()
    }
  }

  fn text(output: &PackagedBundle) -> &str {
    std::str::from_utf8(&output.contents).unwrap()
  }

  #[test]
  fn packages_a_static_require_chain_into_one_artifact() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry(
      "index.js",
      "var local = require('./local');\nmodule.exports = local.a + local.b;",
    );
    fixture.link(index, "./local", "local.js", "exports.a = 1;\nexports.b = 2;", Priority::Sync);

    let (_, outputs) = fixture.package(&no_maps());

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name, "index.js");

    let contents = text(&outputs[0]);
    assert!(contents.contains("\"id-index.js\": [function (require, module, exports)"));
    assert!(contents.contains("\"id-local.js\": [function (require, module, exports)"));
    assert!(contents.contains(r#"{"./local":"id-local.js"}"#));
    assert!(contents.contains(r#", "id-index.js");"#));
  }

  #[test]
  fn rewrites_dynamic_imports_to_loader_calls() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry(
      "index.js",
      "module.exports = function () { return import('./lazy'); };",
    );
    fixture.link(index, "./lazy", "lazy.js", "module.exports = 3;", Priority::Lazy);

    let (_, outputs) = fixture.package(&no_maps());

    assert_eq!(outputs.len(), 2);

    // Children are packaged first
    let child = &outputs[0];
    let parent = &outputs[1];
    assert!(child.name.ends_with(".js"));
    assert_ne!(child.name, "index.js");
    assert_eq!(parent.name, "index.js");

    let expected = format!(
      "globalThis.satchelRequire.loadBundle(\"{}\", \"id-lazy.js\")",
      child.name
    );
    assert!(text(parent).contains(&expected));
    assert!(!text(parent).contains("import('./lazy')"));
  }

  #[test]
  fn dynamic_bundle_names_carry_the_import_name_hint() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry(
      "index.js",
      "module.exports = function () { return import('./lazy'); };",
    );
    let source_id = fixture.graph.get_asset(index).unwrap().id.clone();
    let dep = fixture.graph.add_dependency(
      index,
      Dependency {
        priority: Priority::Lazy,
        name_hint: Some(String::from("lazy")),
        ..Dependency::new(String::from("./lazy"), source_id)
      },
    );
    fixture
      .graph
      .add_asset(dep, GraphFixture::asset("lazy.js", "module.exports = 3;"));

    let (_, outputs) = fixture.package(&no_maps());

    let child = outputs
      .iter()
      .find(|output| output.name != "index.js")
      .unwrap();
    assert!(child.name.starts_with("lazy."));
    assert!(child.name.ends_with(".js"));
    // The hash stays in the name so the hint never collides
    assert_ne!(child.name, "lazy.js");
  }

  #[test]
  fn copies_raw_assets_verbatim_and_shims_their_url() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry(
      "index.js",
      "module.exports = require('./logo.png');",
    );
    let raw = fixture.link(index, "./logo.png", "logo.png", "PNGDATA", Priority::Sync);
    fixture.mark_isolated(raw);

    let (_, outputs) = fixture.package(&no_maps());

    let raw_output = outputs.iter().find(|o| o.name.ends_with(".png")).unwrap();
    let entry_output = outputs.iter().find(|o| o.name == "index.js").unwrap();

    assert_eq!(raw_output.contents, b"PNGDATA".to_vec());
    assert_eq!(raw_output.name, format!("{}.png", content_hash(b"PNGDATA")));

    let shim = format!("module.exports = \"/dist/{}\";", raw_output.name);
    assert!(text(entry_output).contains(&shim));
    assert!(text(entry_output).contains(r#"{"./logo.png":"id-logo.png"}"#));
  }

  #[test]
  fn rewrites_worker_urls() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js", "var w = new Worker('./worker.js');");
    let source_id = fixture.graph.get_asset(index).unwrap().id.clone();
    let dep = fixture.graph.add_dependency(
      index,
      Dependency {
        priority: Priority::Parallel,
        is_worker: true,
        ..Dependency::new(String::from("./worker.js"), source_id)
      },
    );
    fixture
      .graph
      .add_asset(dep, GraphFixture::asset("worker.js", "postMessage(42);"));

    let (_, outputs) = fixture.package(&no_maps());

    let worker_output = outputs.iter().find(|o| o.name != "index.js").unwrap();
    let entry_output = outputs.iter().find(|o| o.name == "index.js").unwrap();

    let expected = format!("new Worker(\"/dist/{}\"", worker_output.name);
    assert!(text(entry_output).contains(&expected));
    // Worker bundles require their entry on load
    assert!(text(worker_output).contains(r#", "id-worker.js");"#));
  }

  #[test]
  fn substitutes_environment_values() {
    let mut fixture = GraphFixture::new();
    fixture.entry("index.js", "module.exports = process.env.API_URL;");

    let options = SatchelOptions {
      env: BTreeMap::from([(String::from("API_URL"), String::from("https://api"))]),
      ..no_maps()
    };
    let (_, outputs) = fixture.package(&options);

    assert!(text(&outputs[0]).contains("module.exports = \"https://api\";"));
  }

  #[test]
  fn injects_dirname_filename_and_global() {
    let mut fixture = GraphFixture::new();
    fixture.entry(
      "src/index.js",
      "module.exports = { dir: __dirname, file: __filename, g: global };",
    );

    let (_, outputs) = fixture.package(&no_maps());
    let contents = text(&outputs[0]);

    assert!(contents.contains("var __filename = \"src/index.js\";"));
    assert!(contents.contains("var __dirname = \"src\";"));
    assert!(contents.contains("var global = globalThis;"));
  }

  #[test]
  fn production_mode_strips_dead_environment_branches() {
    let mut fixture = GraphFixture::new();
    fixture.entry(
      "index.js",
      concat!(
        "if (process.env.NODE_ENV === 'development') {\n",
        "  module.exports = 'dev';\n",
        "} else {\n",
        "  module.exports = 'prod';\n",
        "}\n",
      ),
    );

    let options = SatchelOptions {
      mode: BuildMode::Production,
      ..no_maps()
    };
    let (_, outputs) = fixture.package(&options);
    let contents = text(&outputs[0]);

    assert!(contents.contains("module.exports = 'prod';"));
    assert!(!contents.contains("'dev'"));
  }

  #[test]
  fn emits_source_map_companions_with_a_footer_reference() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js", "module.exports = 1;");
    fixture.link(index, "./local.js", "local.js", "exports.a = 1;", Priority::Sync);

    let (_, outputs) = fixture.package(&SatchelOptions::default());

    let entry_output = outputs.iter().find(|o| o.name == "index.js").unwrap();
    let map_output = outputs.iter().find(|o| o.name == "index.js.map").unwrap();

    assert!(text(entry_output).ends_with("//# sourceMappingURL=index.js.map\n"));

    let map: serde_json::Value = serde_json::from_slice(&map_output.contents).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "index.js");
    let sources: Vec<&str> = map["sources"]
      .as_array()
      .unwrap()
      .iter()
      .map(|s| s.as_str().unwrap())
      .collect();
    assert_eq!(sources, vec!["local.js", "index.js"]);
  }

  #[test]
  fn packages_stylesheets_as_concatenated_css() {
    let mut fixture = GraphFixture::new();
    let index = fixture.entry("index.js", "require('./style.css');\nmodule.exports = 1;");
    let style = fixture.link(
      index,
      "./style.css",
      "style.css",
      "@import \"./base.css\";\nbody { color: red; }",
      Priority::Sync,
    );
    fixture.link(style, "./base.css", "base.css", "html { margin: 0; }", Priority::Sync);

    let (_, outputs) = fixture.package(&no_maps());

    let css_output = outputs.iter().find(|o| o.name.ends_with(".css")).unwrap();
    let entry_output = outputs.iter().find(|o| o.name == "index.js").unwrap();

    assert_eq!(
      text(css_output),
      "html { margin: 0; }\nbody { color: red; }\n"
    );
    // Stylesheets live in their own bundle; requiring one yields an empty
    // module
    assert!(text(entry_output).contains(r#"{"./style.css":null}"#));
  }

  #[test]
  fn assigns_names_back_onto_the_bundle_graph() {
    let mut fixture = GraphFixture::new();
    fixture.entry("index.js", "module.exports = 1;");

    let (bundle_graph, _) = fixture.package(&no_maps());

    assert_eq!(
      bundle_graph.bundles[0].name.as_deref(),
      Some("index.js")
    );
  }
}
