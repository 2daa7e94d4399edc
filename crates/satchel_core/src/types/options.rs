use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::plugin::BuildDelegate;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BuildMode {
  #[default]
  Development,
  /// Enables the minification post-pass and dead-branch elimination of
  /// environment checks.
  Production,
}

/// Build configuration, constructed once at build start and passed by
/// reference through the pipeline.
#[derive(Clone, Debug)]
pub struct SatchelOptions {
  /// Entry file paths, relative to the project root or absolute
  pub entries: Vec<String>,

  pub mode: BuildMode,

  /// Directory bundle artifacts are written to
  pub out_dir: PathBuf,

  /// URL prefix importers receive for raw asset references
  pub public_url: String,

  /// Whether every non-raw bundle gets a source map companion bundle
  pub source_maps: bool,

  /// Process environment values substituted into script output
  pub env: BTreeMap<String, String>,

  /// Optional environment file merged before substitution. Values from the
  /// file never override keys already present in `env`.
  pub env_file: Option<PathBuf>,

  /// External hook allowing the caller to inject implicit dependency edges
  pub delegate: Option<Arc<dyn BuildDelegate>>,
}

impl Default for SatchelOptions {
  fn default() -> Self {
    Self {
      entries: Vec::new(),
      mode: BuildMode::default(),
      out_dir: PathBuf::from("dist"),
      public_url: String::from("/dist"),
      source_maps: true,
      env: BTreeMap::new(),
      env_file: None,
      delegate: None,
    }
  }
}
