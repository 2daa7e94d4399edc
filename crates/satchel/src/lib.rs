//! The build orchestrator: resolves and transforms assets into an asset
//! graph, splits the graph into a bundle tree and packages each bundle into
//! an output artifact.

mod asset_graph_builder;
mod bundler;
mod environment;
mod optimizer;
mod packager;
mod plugins;
mod satchel;
mod transform_cache;

pub use bundler::BundleGraphBuilder;
pub use packager::{PackagedBundle, Packager};
pub use plugins::PluginRegistry;
pub use satchel::{BuildResult, Satchel};
