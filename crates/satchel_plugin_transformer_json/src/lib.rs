mod json_transformer;

pub use json_transformer::SatchelJsonTransformerPlugin;
