use std::path::Path;

use anyhow::Error;
use async_trait::async_trait;
use satchel_core::plugin::{TransformResult, TransformerPlugin};
use satchel_core::types::{Asset, Dependency, Priority};

use crate::scanner::{scan_imports, ImportKind};

/// Scans script assets for require / import / dynamic import / worker
/// references and emits them as dependencies. The code itself passes
/// through untouched; all rewriting happens at packaging time.
#[derive(Debug)]
pub struct SatchelJsTransformerPlugin {}

impl SatchelJsTransformerPlugin {
  pub fn new() -> Self {
    SatchelJsTransformerPlugin {}
  }
}

impl Default for SatchelJsTransformerPlugin {
  fn default() -> Self {
    Self::new()
  }
}

fn name_hint(specifier: &str) -> Option<String> {
  Path::new(specifier)
    .file_stem()
    .and_then(|stem| stem.to_str())
    .map(|stem| stem.to_string())
}

#[async_trait]
impl TransformerPlugin for SatchelJsTransformerPlugin {
  #[tracing::instrument(
    level = "debug",
    skip_all,
    fields(plugin = "SatchelJsTransformerPlugin")
  )]
  async fn transform(&self, asset: Asset) -> Result<TransformResult, Error> {
    let code = asset.code.as_str()?;

    let dependencies = scan_imports(code)
      .into_iter()
      .map(|import| {
        let base = Dependency::new(import.specifier, asset.id.clone());
        match import.kind {
          ImportKind::Require => Dependency {
            is_optional: import.is_optional,
            ..base
          },
          ImportKind::EsmImport => Dependency {
            is_esm: true,
            ..base
          },
          ImportKind::DynamicImport => Dependency {
            priority: Priority::Lazy,
            is_esm: true,
            name_hint: name_hint(&base.specifier),
            ..base
          },
          ImportKind::Worker | ImportKind::ServiceWorker => Dependency {
            priority: Priority::Parallel,
            is_worker: true,
            ..base
          },
        }
      })
      .collect();

    Ok(TransformResult {
      asset,
      dependencies,
    })
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use satchel_core::types::{Code, FileType};

  use super::*;

  fn js_asset(code: &str) -> Asset {
    Asset {
      id: String::from("sourceasset0000a"),
      code: Code::from(code),
      file_type: FileType::Js,
      ..Asset::default()
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn emits_sync_dependencies_for_requires() {
    let plugin = SatchelJsTransformerPlugin::new();
    let source = "var local = require('./local');\nmodule.exports = local.a + local.b;\n";

    let result = plugin.transform(js_asset(source)).await.unwrap();

    assert_eq!(result.asset.code.as_str().unwrap(), source);
    assert_eq!(result.dependencies.len(), 1);

    let dependency = &result.dependencies[0];
    assert_eq!(dependency.specifier, "./local");
    assert_eq!(dependency.priority, Priority::Sync);
    assert!(!dependency.is_esm);
    assert_eq!(
      dependency.source_asset_id.as_deref(),
      Some("sourceasset0000a")
    );
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn emits_lazy_dependency_with_name_hint_for_dynamic_import() {
    let plugin = SatchelJsTransformerPlugin::new();
    let source = "import('./local.js').then(function (local) {});\n";

    let result = plugin.transform(js_asset(source)).await.unwrap();

    let dependency = &result.dependencies[0];
    assert_eq!(dependency.specifier, "./local.js");
    assert_eq!(dependency.priority, Priority::Lazy);
    assert!(dependency.is_esm);
    assert_eq!(dependency.name_hint.as_deref(), Some("local"));
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn emits_parallel_worker_dependencies() {
    let plugin = SatchelJsTransformerPlugin::new();
    let source = concat!(
      "var worker = new Worker('./worker.js');\n",
      "navigator.serviceWorker.register('./sw.js', { scope: './' });\n",
    );

    let result = plugin.transform(js_asset(source)).await.unwrap();

    assert_eq!(result.dependencies.len(), 2);
    for dependency in &result.dependencies {
      assert_eq!(dependency.priority, Priority::Parallel);
      assert!(dependency.is_worker);
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn marks_try_wrapped_requires_optional() {
    let plugin = SatchelJsTransformerPlugin::new();
    let source = "try {\n  var missing = require('./missing');\n} catch (err) {}\n";

    let result = plugin.transform(js_asset(source)).await.unwrap();

    assert!(result.dependencies[0].is_optional);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn marks_esm_imports() {
    let plugin = SatchelJsTransformerPlugin::new();
    let source = "import { a } from './ab';\nexport * from './d';\n";

    let result = plugin.transform(js_asset(source)).await.unwrap();

    assert_eq!(result.dependencies.len(), 2);
    assert!(result.dependencies.iter().all(|dependency| dependency.is_esm));
  }
}
