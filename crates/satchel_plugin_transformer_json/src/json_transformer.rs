use anyhow::Error;
use async_trait::async_trait;
use satchel_core::plugin::{TransformResult, TransformerPlugin};
use satchel_core::types::{Asset, Code, FileType};

/// Escape JSON string for embedding in a JavaScript double-quoted string
fn escape_for_double_quotes(input: &str) -> String {
  input.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug)]
pub struct SatchelJsonTransformerPlugin {}

impl SatchelJsonTransformerPlugin {
  pub fn new() -> Self {
    SatchelJsonTransformerPlugin {}
  }
}

impl Default for SatchelJsonTransformerPlugin {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl TransformerPlugin for SatchelJsonTransformerPlugin {
  #[tracing::instrument(
    level = "debug",
    skip_all,
    fields(plugin = "SatchelJsonTransformerPlugin")
  )]
  async fn transform(&self, asset: Asset) -> Result<TransformResult, Error> {
    // Parsing and re-serializing minifies the JSON as a side effect
    let parsed = serde_json::from_slice::<serde_json::Value>(asset.code.bytes())?;
    let json_string = serde_json::to_string(&parsed)?;

    let js_code = format!(
      "module.exports = JSON.parse(\"{}\");",
      escape_for_double_quotes(&json_string)
    );

    Ok(TransformResult {
      asset: Asset {
        code: Code::from(js_code),
        file_type: FileType::Js,
        ..asset
      },
      ..Default::default()
    })
  }
}
