use std::collections::HashMap;
use std::sync::Arc;

use satchel_core::plugin::TransformerPlugin;
use satchel_core::types::FileType;
use satchel_plugin_transformer_css::SatchelCssTransformerPlugin;
use satchel_plugin_transformer_js::SatchelJsTransformerPlugin;
use satchel_plugin_transformer_json::SatchelJsonTransformerPlugin;
use satchel_plugin_transformer_raw::SatchelRawTransformerPlugin;
use satchel_plugin_transformer_yaml::SatchelYamlTransformerPlugin;

/// Maps file types to the transformer that compiles them. Types without a
/// dedicated transformer fall back to the raw passthrough, which isolates
/// the asset into its own url bundle.
#[derive(Clone, Debug)]
pub struct PluginRegistry {
  transformers: HashMap<FileType, Arc<dyn TransformerPlugin>>,
  fallback: Arc<dyn TransformerPlugin>,
}

impl Default for PluginRegistry {
  fn default() -> Self {
    let mut transformers: HashMap<FileType, Arc<dyn TransformerPlugin>> = HashMap::new();

    transformers.insert(FileType::Js, Arc::new(SatchelJsTransformerPlugin::new()));
    transformers.insert(FileType::Json, Arc::new(SatchelJsonTransformerPlugin::new()));
    transformers.insert(FileType::Yaml, Arc::new(SatchelYamlTransformerPlugin::new()));
    transformers.insert(FileType::Css, Arc::new(SatchelCssTransformerPlugin::new()));

    PluginRegistry {
      transformers,
      fallback: Arc::new(SatchelRawTransformerPlugin::new()),
    }
  }
}

impl PluginRegistry {
  pub fn transformer(&self, file_type: &FileType) -> Arc<dyn TransformerPlugin> {
    self
      .transformers
      .get(file_type)
      .unwrap_or(&self.fallback)
      .clone()
  }
}
