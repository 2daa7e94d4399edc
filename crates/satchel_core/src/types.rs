mod asset;
mod bundle;
mod dependency;
mod file_type;
mod options;

pub use asset::*;
pub use bundle::*;
pub use dependency::*;
pub use file_type::*;
pub use options::*;
