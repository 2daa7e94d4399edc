use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

/// The subset of a package manifest the resolver consults.
#[derive(Debug, Default, Deserialize)]
pub struct PackageJson {
  #[serde(default)]
  pub name: Option<String>,

  #[serde(default)]
  pub main: Option<String>,

  #[serde(default)]
  pub module: Option<String>,

  #[serde(default, rename = "jsnext:main")]
  pub jsnext_main: Option<String>,

  /// Either a whole-package entry override (string) or a map of per-file
  /// and per-specifier overrides (object with string or `false` values)
  #[serde(default)]
  pub browser: Option<Value>,
}

/// The effect of a browser-field override on one specifier or file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BrowserField {
  /// The target is replaced by another file in the package
  Replaced(PathBuf),
  /// The target is mapped to an empty module
  Excluded,
}

impl PackageJson {
  /// The whole-package browser entry, when the field is in string form.
  pub fn browser_entry(&self) -> Option<String> {
    match &self.browser {
      Some(Value::String(entry)) => Some(entry.clone()),
      _ => None,
    }
  }

  /// Look up a key (a bare specifier or a `./relative` file path) in the
  /// browser map form of the field.
  pub fn browser_alias(&self, key: &str, package_dir: &Path) -> Option<BrowserField> {
    let Some(Value::Object(map)) = &self.browser else {
      return None;
    };

    match map.get(key)? {
      Value::Bool(false) => Some(BrowserField::Excluded),
      Value::String(replacement) => Some(BrowserField::Replaced(join(package_dir, replacement))),
      _ => None,
    }
  }
}

fn join(package_dir: &Path, replacement: &str) -> PathBuf {
  let mut result = package_dir.to_path_buf();
  for component in Path::new(replacement).components() {
    match component {
      std::path::Component::CurDir => {}
      std::path::Component::ParentDir => {
        result.pop();
      }
      other => result.push(other),
    }
  }
  result
}
