use anyhow::Error;
use async_trait::async_trait;
use satchel_core::plugin::{TransformResult, TransformerPlugin};
use satchel_core::types::{Asset, BundleBehavior};

/// Fallback transformer for file types without a dedicated plugin. The
/// contents pass through untouched and the asset is marked isolated so
/// it lands in its own url bundle.
#[derive(Debug)]
pub struct SatchelRawTransformerPlugin {}

impl SatchelRawTransformerPlugin {
  pub fn new() -> Self {
    SatchelRawTransformerPlugin {}
  }
}

impl Default for SatchelRawTransformerPlugin {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl TransformerPlugin for SatchelRawTransformerPlugin {
  async fn transform(&self, asset: Asset) -> Result<TransformResult, Error> {
    Ok(TransformResult {
      asset: Asset {
        bundle_behavior: BundleBehavior::Isolated,
        ..asset
      },
      ..Default::default()
    })
  }
}
