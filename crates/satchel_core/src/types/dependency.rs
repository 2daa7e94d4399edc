use std::hash::Hash;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::hash::{finish_identifier, IdentifierHasher};
use crate::types::AssetId;

/// Determines when a dependency should load
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  /// Resolved synchronously, the target asset is placed in the same bundle
  /// as the parent or in a bundle that is already loaded
  #[default]
  Sync,
  /// The target is placed in a separate bundle loaded in parallel with the
  /// current bundle (workers)
  Parallel,
  /// The target is placed in a separate bundle loaded on demand (dynamic
  /// import)
  Lazy,
}

pub fn create_dependency_id(
  source_asset_id: Option<&AssetId>,
  specifier: &str,
  priority: &Priority,
  is_worker: bool,
) -> String {
  let mut hasher = IdentifierHasher::default();

  source_asset_id.hash(&mut hasher);
  specifier.hash(&mut hasher);
  priority.hash(&mut hasher);
  is_worker.hash(&mut hasher);

  finish_identifier(hasher)
}

/// A dependency denotes a directed connection between two assets
#[derive(Hash, PartialEq, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
  /// The import or export specifier that connects two assets together,
  /// exactly as written in the source
  pub specifier: String,

  /// Determines when the dependency should be loaded
  pub priority: Priority,

  /// Whether the dependency is an entry
  pub is_entry: bool,

  /// Whether the dependency is optional
  ///
  /// If an optional dependency cannot be resolved, it will not fail the
  /// build.
  pub is_optional: bool,

  /// Whether the target runs in a separate worker execution context
  pub is_worker: bool,

  /// Whether this dependency corresponds to an ESM import/export statement
  /// rather than a CommonJS require
  pub is_esm: bool,

  /// Name hint used when generating filenames for dynamic-import bundles
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name_hint: Option<String>,

  /// The id of the asset with this dependency
  pub source_asset_id: Option<AssetId>,

  /// The file path where the dependency should be resolved from
  ///
  /// By default, this is the path of the source file where the dependency
  /// was specified.
  pub resolve_from: Option<PathBuf>,
}

impl Dependency {
  pub fn id(&self) -> String {
    create_dependency_id(
      self.source_asset_id.as_ref(),
      &self.specifier,
      &self.priority,
      self.is_worker,
    )
  }

  pub fn entry(specifier: String) -> Dependency {
    Dependency {
      specifier,
      is_entry: true,
      ..Dependency::default()
    }
  }

  pub fn new(specifier: String, source_asset_id: AssetId) -> Dependency {
    Dependency {
      specifier,
      source_asset_id: Some(source_asset_id),
      ..Dependency::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_is_stable_for_equal_dependencies() {
    let a = Dependency::new(String::from("./local"), String::from("abc123"));
    let b = Dependency::new(String::from("./local"), String::from("abc123"));

    assert_eq!(a.id(), b.id());
  }

  #[test]
  fn id_distinguishes_priority() {
    let sync = Dependency::new(String::from("./local"), String::from("abc123"));
    let lazy = Dependency {
      priority: Priority::Lazy,
      ..sync.clone()
    };

    assert_ne!(sync.id(), lazy.id());
  }

  #[test]
  fn entry_dependencies_are_marked() {
    let dep = Dependency::entry(String::from("src/index.js"));

    assert!(dep.is_entry);
    assert_eq!(dep.priority, Priority::Sync);
    assert!(dep.source_asset_id.is_none());
  }
}
