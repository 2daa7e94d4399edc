use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use satchel_core::diagnostic::TransformError;
use satchel_core::hash::IdentifierHasher;
use satchel_core::plugin::{TransformResult, TransformerPlugin};
use satchel_core::types::Asset;
use tokio::sync::OnceCell;

/// Content-addressed transform cache with single-flight semantics.
///
/// Keys are derived from the asset's path and content hash plus the
/// transformer id and build config fingerprint, so a cached result is valid
/// for as long as none of those change. Concurrent requests for the same
/// key coalesce into one in-flight transform; later callers await the same
/// cell instead of re-running the plugin.
#[derive(Debug, Default)]
pub struct TransformCache {
  cells: Mutex<HashMap<u64, Arc<OnceCell<Arc<TransformResult>>>>>,
}

pub fn transform_cache_key(asset: &Asset, plugin_id: u64, config_fingerprint: u64) -> u64 {
  let mut hasher = IdentifierHasher::default();

  asset.file_path.hash(&mut hasher);
  asset.content_hash.hash(&mut hasher);
  plugin_id.hash(&mut hasher);
  config_fingerprint.hash(&mut hasher);

  hasher.finish()
}

impl TransformCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the cached result for the key, running the transform at most
  /// once per key. Errors are not cached; a failed transform leaves the
  /// cell empty so a later caller may retry.
  pub async fn get_or_transform(
    &self,
    key: u64,
    plugin: Arc<dyn TransformerPlugin>,
    asset: Asset,
  ) -> anyhow::Result<Arc<TransformResult>> {
    let cell = self.cells.lock().entry(key).or_default().clone();

    let result = cell
      .get_or_try_init(|| async {
        let file_path = asset.file_path.clone();
        let result = plugin.transform(asset).await.map_err(|source| {
          anyhow::Error::new(TransformError { file_path, source })
        })?;

        Ok::<_, anyhow::Error>(Arc::new(result))
      })
      .await?;

    Ok(result.clone())
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.cells.lock().len()
  }
}
