//! Maps dependency specifiers to absolute asset paths.
//!
//! Resolution applies package-entry-field precedence (browser, module,
//! jsnext:main, main, then index-file fallback) and extension fallback, with
//! support for both whole-package and per-file browser-field overrides.

mod package_json;

use std::path::{Path, PathBuf};

use satchel_core::diagnostic::ResolutionError;
use satchel_filesystem::FileSystemRef;

pub use package_json::{BrowserField, PackageJson};

/// A package-manifest field consulted when resolving a package's entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryField {
  Browser,
  Module,
  JsnextMain,
  Main,
}

/// Resolver configuration: field precedence and extension fallback order.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
  /// Entry fields in precedence order; first match wins
  pub entry_fields: Vec<EntryField>,

  /// Whether the importer context prefers ES-module-aware entries. When
  /// false, the `module` and `jsnext:main` fields are not consulted.
  pub prefers_esm_entries: bool,

  /// Extensions tried, in order, when a specifier has none
  pub extensions: Vec<String>,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      entry_fields: vec![
        EntryField::Browser,
        EntryField::Module,
        EntryField::JsnextMain,
        EntryField::Main,
      ],
      prefers_esm_entries: true,
      extensions: vec![String::from("js"), String::from("jsx"), String::from("json")],
    }
  }
}

/// The outcome of a successful resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
  /// An absolute path to the resolved file
  Path(PathBuf),
  /// The specifier was mapped to an empty module (browser field `false`)
  Excluded,
}

pub struct Resolver {
  fs: FileSystemRef,
  config: ResolverConfig,
}

impl Resolver {
  pub fn new(fs: FileSystemRef, config: ResolverConfig) -> Self {
    Self { fs, config }
  }

  /// Resolve a dependency specifier against the file it was written in.
  #[tracing::instrument(level = "debug", skip(self))]
  pub fn resolve(&self, specifier: &str, from: &Path) -> Result<Resolution, ResolutionError> {
    let error = || ResolutionError {
      specifier: specifier.to_string(),
      from: from.to_path_buf(),
    };

    let resolved = if Path::new(specifier).is_absolute() {
      self.load_path(Path::new(specifier))
    } else if specifier.starts_with('.') {
      let base = from.parent().unwrap_or(from);
      self.load_path(&join_normalized(base, specifier))
    } else {
      // Bare specifier: a package alias in the importing package's browser
      // field takes precedence over the node_modules walk
      match self.package_alias(specifier, from) {
        Some(BrowserField::Excluded) => return Ok(Resolution::Excluded),
        Some(BrowserField::Replaced(path)) => self.load_path(&path),
        None => self.resolve_node_module(specifier, from),
      }
    };

    let path = resolved.ok_or_else(error)?;

    // Per-file browser-field overrides of the package the resolved file
    // lives in are applied last
    match self.file_alias(&path) {
      Some(BrowserField::Excluded) => Ok(Resolution::Excluded),
      Some(BrowserField::Replaced(replacement)) => {
        let path = self.load_path(&replacement).ok_or_else(error)?;
        Ok(Resolution::Path(path))
      }
      None => Ok(Resolution::Path(path)),
    }
  }

  /// Try a path as a file (with extension fallback), then as a directory.
  fn load_path(&self, path: &Path) -> Option<PathBuf> {
    if self.fs.is_file(path) {
      return Some(path.to_path_buf());
    }

    if path.extension().is_none() {
      for ext in &self.config.extensions {
        let with_ext = path.with_extension(ext);
        if self.fs.is_file(&with_ext) {
          return Some(with_ext);
        }
      }
    }

    if self.fs.is_dir(path) {
      return self.load_directory(path);
    }

    None
  }

  /// Resolve a directory through its package manifest, falling back to
  /// conventional index files.
  fn load_directory(&self, dir: &Path) -> Option<PathBuf> {
    if let Some(package) = self.read_package(dir) {
      if let Some(entry) = self.package_entry(&package) {
        let target = join_normalized(dir, &entry);
        // A package entry may itself be a directory (e.g. "./lib")
        if let Some(path) = self.load_path(&target) {
          return Some(path);
        }
      }
    }

    for ext in &self.config.extensions {
      let index = dir.join(format!("index.{ext}"));
      if self.fs.is_file(&index) {
        return Some(index);
      }
    }

    None
  }

  /// Select a package's entry point following the configured field
  /// precedence. Each field is independent; the first usable one wins.
  fn package_entry(&self, package: &PackageJson) -> Option<String> {
    for field in &self.config.entry_fields {
      let entry = match field {
        EntryField::Browser => package.browser_entry(),
        EntryField::Module if self.config.prefers_esm_entries => package.module.clone(),
        EntryField::JsnextMain if self.config.prefers_esm_entries => package.jsnext_main.clone(),
        EntryField::Main => package.main.clone(),
        _ => None,
      };

      if entry.is_some() {
        return entry;
      }
    }

    None
  }

  /// Walk up from the importing file looking in node_modules directories.
  fn resolve_node_module(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
    let mut dir = from.parent();

    while let Some(current) = dir {
      let candidate = current.join("node_modules").join(specifier);
      if let Some(path) = self.load_path(&candidate) {
        return Some(path);
      }
      dir = current.parent();
    }

    None
  }

  /// Look up a bare specifier in the browser map of the package containing
  /// the importing file.
  fn package_alias(&self, specifier: &str, from: &Path) -> Option<BrowserField> {
    let (package_dir, package) = self.find_package(from)?;
    package.browser_alias(specifier, &package_dir)
  }

  /// Look up a resolved file in the browser map of its own package.
  fn file_alias(&self, path: &Path) -> Option<BrowserField> {
    let (package_dir, package) = self.find_package(path)?;

    let relative = path.strip_prefix(&package_dir).ok()?;
    let key = format!("./{}", relative.to_string_lossy().replace('\\', "/"));

    package.browser_alias(&key, &package_dir)
  }

  /// The nearest enclosing package manifest, walking up from a file.
  fn find_package(&self, path: &Path) -> Option<(PathBuf, PackageJson)> {
    let mut dir = path.parent();

    while let Some(current) = dir {
      if let Some(package) = self.read_package(current) {
        return Some((current.to_path_buf(), package));
      }
      if current.file_name().is_some_and(|name| name == "node_modules") {
        break;
      }
      dir = current.parent();
    }

    None
  }

  fn read_package(&self, dir: &Path) -> Option<PackageJson> {
    let manifest = dir.join("package.json");
    let contents = self.fs.read_to_string(&manifest).ok()?;

    match serde_json::from_str::<PackageJson>(&contents) {
      Ok(package) => Some(package),
      Err(error) => {
        tracing::warn!("Ignoring malformed {}: {error}", manifest.display());
        None
      }
    }
  }
}

/// Join a relative specifier onto a base directory, folding `.` and `..`
/// components so resolved paths are canonical.
fn join_normalized(base: &Path, specifier: &str) -> PathBuf {
  let mut result = base.to_path_buf();

  for component in Path::new(specifier).components() {
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
