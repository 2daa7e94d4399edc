mod css_transformer;

pub use css_transformer::SatchelCssTransformerPlugin;
