use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::str;

use satchel_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

use crate::hash::{content_hash, finish_identifier, IdentifierHasher};

use super::file_type::FileType;

pub type AssetId = String;

/// The contents of an asset.
///
/// Initially the raw bytes read from disk, replaced by the generated
/// intermediate code once the asset has been transformed.
#[derive(PartialEq, Eq, Default, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Code {
  inner: Vec<u8>,
}

impl Code {
  pub fn new(bytes: Vec<u8>) -> Self {
    Self { inner: bytes }
  }

  pub fn bytes(&self) -> &[u8] {
    &self.inner
  }

  pub fn as_str(&self) -> anyhow::Result<&str> {
    str::from_utf8(&self.inner)
      .map_err(|e| anyhow::Error::new(e).context("Failed to convert code to UTF8 str"))
  }
}

impl Display for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:?}", self.inner)
  }
}

impl Debug for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.as_str() {
      Ok(code) => write!(f, "{:?}", code),
      Err(_) => write!(f, "<{} binary bytes>", self.inner.len()),
    }
  }
}

impl From<String> for Code {
  fn from(value: String) -> Self {
    Self {
      inner: value.into_bytes(),
    }
  }
}

impl From<&str> for Code {
  fn from(value: &str) -> Self {
    Self {
      inner: value.to_owned().into_bytes(),
    }
  }
}

/// Controls which bundle an asset is placed into.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleBehavior {
  #[default]
  None,
  /// The asset is opaque and always gets its own content-hash-named leaf
  /// bundle, with its bytes copied verbatim.
  Isolated,
}

pub fn create_asset_id(project_relative_path: &str, file_type: &FileType) -> AssetId {
  let mut hasher = IdentifierHasher::default();

  project_relative_path.hash(&mut hasher);
  file_type.hash(&mut hasher);

  finish_identifier(hasher)
}

/// One resolved source file plus its generated intermediate code.
///
/// Owned by the asset graph and immutable once transformed. Re-transforming
/// on invalidation produces a logically new version with the same identity.
#[derive(Default, PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
  /// The identity hash for the asset. It is consistent for the entire build
  /// and between builds.
  pub id: AssetId,

  /// The absolute file path to the asset
  pub file_path: PathBuf,

  /// The file type of the asset, which may change during transformation
  #[serde(rename = "type")]
  pub file_type: FileType,

  /// The code of this asset, initially read from disk, then becoming the
  /// transformed output
  pub code: Code,

  /// Digest of the raw source bytes, used as a cache key component and for
  /// generating output filenames
  pub content_hash: String,

  /// Controls which bundle the asset is placed into
  pub bundle_behavior: BundleBehavior,

  /// Whether this asset can be omitted if none of its exports are used
  pub side_effects: bool,
}

impl Asset {
  pub fn new(file_path: PathBuf, fs: &FileSystemRef, project_root: &Path) -> anyhow::Result<Self> {
    let file_type =
      FileType::from_extension(file_path.extension().and_then(|s| s.to_str()).unwrap_or(""));

    let bytes = fs.read(&file_path)?;
    let hash = content_hash(&bytes);

    let id = create_asset_id(
      &project_path(project_root, &file_path).to_string_lossy(),
      &file_type,
    );

    Ok(Self {
      id,
      file_path,
      file_type,
      code: Code::new(bytes),
      content_hash: hash,
      bundle_behavior: BundleBehavior::None,
      side_effects: true,
    })
  }

  /// The last path component, used by delegate hooks and diagnostics.
  pub fn basename(&self) -> &str {
    self
      .file_path
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or_default()
  }
}

fn project_path(project_root: &Path, file_path: &Path) -> PathBuf {
  file_path
    .strip_prefix(project_root)
    .unwrap_or(file_path)
    .to_path_buf()
}
