mod yaml_transformer;

pub use yaml_transformer::SatchelYamlTransformerPlugin;
