use anyhow::Error;
use async_trait::async_trait;
use satchel_core::plugin::{TransformResult, TransformerPlugin};
use satchel_core::types::{Asset, Code, FileType};

#[derive(Debug)]
pub struct SatchelYamlTransformerPlugin {}

impl SatchelYamlTransformerPlugin {
  pub fn new() -> Self {
    SatchelYamlTransformerPlugin {}
  }
}

impl Default for SatchelYamlTransformerPlugin {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl TransformerPlugin for SatchelYamlTransformerPlugin {
  async fn transform(&self, asset: Asset) -> Result<TransformResult, Error> {
    let code = serde_yml::from_slice::<serde_yml::Value>(asset.code.bytes())?;
    let code = serde_json::to_string(&code)?;

    Ok(TransformResult {
      asset: Asset {
        code: Code::from(format!("module.exports = {code};")),
        file_type: FileType::Js,
        ..asset
      },
      ..Default::default()
    })
  }
}
