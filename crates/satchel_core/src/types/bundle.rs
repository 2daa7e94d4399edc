use std::hash::Hash;

use serde::Deserialize;
use serde::Serialize;

use crate::hash::{finish_identifier, IdentifierHasher};
use crate::types::{AssetId, FileType};

pub type BundleId = String;

pub fn create_bundle_id(
  root_asset_id: Option<&AssetId>,
  bundle_type: &FileType,
  discriminator: u32,
) -> BundleId {
  let mut hasher = IdentifierHasher::default();

  root_asset_id.hash(&mut hasher);
  bundle_type.hash(&mut hasher);
  discriminator.hash(&mut hasher);

  finish_identifier(hasher)
}

/// An output-unit grouping of assets sharing an execution/loading context.
///
/// Bundles reference assets by id; an asset duplicated into several bundles
/// is a placement decision, not a second asset identity.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
  pub id: BundleId,

  /// The output type of the bundle
  #[serde(rename = "type")]
  pub bundle_type: FileType,

  /// The asset that seeds this bundle, if any. Synthetic bundles such as
  /// source maps have none.
  pub entry_asset_id: Option<AssetId>,

  /// Assets placed in this bundle, in topological order: dependencies
  /// before dependents, stable across re-runs
  pub asset_ids: Vec<AssetId>,

  /// Whether the bundle keeps a predictable name derived from its entry
  /// rather than a content hash
  pub needs_stable_name: bool,

  /// Whether the bundle holds a single opaque asset copied verbatim
  pub is_isolated: bool,

  /// A readable filename prefix carried from the dynamic import that
  /// created the bundle, folded into the hashed output name
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name_hint: Option<String>,

  /// The resolved output filename. Assigned by the packager: stable for
  /// entries, content-hash-derived otherwise.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl Bundle {
  pub fn contains(&self, asset_id: &str) -> bool {
    self.asset_ids.iter().any(|id| id == asset_id)
  }
}
