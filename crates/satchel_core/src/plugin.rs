use std::fmt::Debug;
use std::path::PathBuf;

pub use optimizer_plugin::*;
pub use transformer_plugin::*;

use crate::types::Asset;

mod optimizer_plugin;
mod transformer_plugin;

/// An extra dependency edge injected by the build delegate.
#[derive(Clone, Debug, PartialEq)]
pub struct ImplicitDependency {
  /// Absolute path of the asset to attach
  pub name: PathBuf,
}

/// Hook allowing an external caller to inject dependency edges (for
/// example, attaching a stylesheet to a script entry) without modifying the
/// transform plugin.
pub trait BuildDelegate: Debug + Send + Sync {
  /// Invoked once per asset after transformation.
  fn get_implicit_dependencies(&self, asset: &Asset) -> Option<Vec<ImplicitDependency>>;
}
