mod raw_transformer;

pub use raw_transformer::SatchelRawTransformerPlugin;
