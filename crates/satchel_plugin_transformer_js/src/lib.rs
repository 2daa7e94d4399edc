mod js_transformer;
mod scanner;

pub use js_transformer::SatchelJsTransformerPlugin;
