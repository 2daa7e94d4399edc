use std::sync::LazyLock;

use anyhow::Error;
use async_trait::async_trait;
use regex::Regex;
use satchel_core::plugin::{TransformResult, TransformerPlugin};
use satchel_core::types::{Asset, Dependency};

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
  // @import "./a.css"; | @import url("./a.css");
  Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?\s*;"#)
    .unwrap_or_else(|err| panic!("invalid css import pattern: {err}"))
});

/// Css assets keep their type so they bundle separately from the scripts
/// that reference them. `@import` rules become sync dependencies so the
/// imported sheets join the same css bundle.
#[derive(Debug)]
pub struct SatchelCssTransformerPlugin {}

impl SatchelCssTransformerPlugin {
  pub fn new() -> Self {
    SatchelCssTransformerPlugin {}
  }
}

impl Default for SatchelCssTransformerPlugin {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl TransformerPlugin for SatchelCssTransformerPlugin {
  async fn transform(&self, asset: Asset) -> Result<TransformResult, Error> {
    let code = asset.code.as_str()?;

    let dependencies = IMPORT_RE
      .captures_iter(code)
      .map(|capture| Dependency::new(capture[1].to_string(), asset.id.clone()))
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

  #[tokio::test(flavor = "multi_thread")]
  async fn extracts_import_dependencies() {
    let plugin = SatchelCssTransformerPlugin::new();

    let asset = Asset {
      code: Code::from("@import \"./base.css\";\n@import url('./theme.css');\nbody { color: red; }\n"),
      file_type: FileType::Css,
      ..Asset::default()
    };

    let result = plugin.transform(asset).await.unwrap();

    let specifiers: Vec<&str> = result
      .dependencies
      .iter()
      .map(|dependency| dependency.specifier.as_str())
      .collect();
    assert_eq!(specifiers, vec!["./base.css", "./theme.css"]);
    assert_eq!(result.asset.file_type, FileType::Css);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn leaves_contents_unchanged() {
    let plugin = SatchelCssTransformerPlugin::new();
    let source = ".a { background: url(\"image.png\"); }\n";

    let asset = Asset {
      code: Code::from(source),
      file_type: FileType::Css,
      ..Asset::default()
    };

    let result = plugin.transform(asset).await.unwrap();

    assert_eq!(result.asset.code.as_str().unwrap(), source);
    assert!(result.dependencies.is_empty());
  }
}
