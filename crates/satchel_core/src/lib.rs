pub mod asset_graph;
pub mod bundle_graph;
pub mod diagnostic;
pub mod hash;
pub mod plugin;
pub mod types;
