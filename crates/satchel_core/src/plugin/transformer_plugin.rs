use std::any::Any;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::hash::IdentifierHasher;
use crate::types::{Asset, Dependency};

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TransformResult {
  pub asset: Asset,
  /// Raw dependencies extracted from the asset, in source order
  pub dependencies: Vec<Dependency>,
}

/// Compile a single asset into the common intermediate form and discover
/// its dependencies.
///
/// Transforms must be deterministic for identical (content, config) so
/// results can be cached and reused regardless of execution order.
#[async_trait]
pub trait TransformerPlugin: Any + Debug + Send + Sync {
  /// Unique ID for this transformer, part of the transform cache key
  fn id(&self) -> u64 {
    let mut hasher = IdentifierHasher::default();
    self.type_id().hash(&mut hasher);
    hasher.finish()
  }

  /// Transform the asset, returning generated code plus extracted
  /// dependencies
  async fn transform(&self, asset: Asset) -> Result<TransformResult, anyhow::Error>;
}
