use std::collections::HashMap;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::FileSystem;

#[cfg(not(target_os = "windows"))]
fn root_dir() -> PathBuf {
  PathBuf::from("/")
}

#[cfg(target_os = "windows")]
fn root_dir() -> PathBuf {
  PathBuf::from("C:/")
}

/// In memory implementation of a file-system entry
#[derive(Debug)]
enum InMemoryFileSystemEntry {
  File { contents: Vec<u8> },
  Directory,
}

/// In memory implementation of the `FileSystem` trait, for testing purposes.
#[derive(Debug)]
pub struct InMemoryFileSystem {
  files: RwLock<HashMap<PathBuf, InMemoryFileSystemEntry>>,
  current_working_directory: RwLock<PathBuf>,
}

impl Default for InMemoryFileSystem {
  fn default() -> Self {
    Self {
      files: Default::default(),
      current_working_directory: RwLock::new(root_dir()),
    }
  }
}

impl InMemoryFileSystem {
  /// Change the current working directory. Used for resolving relative paths.
  pub fn set_current_working_directory(&self, cwd: &Path) {
    let cwd = self.normalize(cwd);
    let mut state = self.current_working_directory.write();
    *state = cwd;
  }

  /// Convenience helper for writing string fixtures.
  pub fn write_file(&self, path: &Path, contents: impl Into<String>) {
    self
      .write(path, contents.into().as_bytes())
      .expect("in-memory writes are infallible");
  }

  /// Resolve `.`, `..` and relative paths against the current working directory.
  fn normalize(&self, path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.current_working_directory.read().join(path)
    };

    let mut result = PathBuf::new();
    for component in path.components() {
      match component {
        Component::CurDir => {}
        Component::ParentDir => {
          result.pop();
        }
        other => result.push(other),
      }
    }

    result
  }
}

impl FileSystem for InMemoryFileSystem {
  fn cwd(&self) -> io::Result<PathBuf> {
    Ok(self.current_working_directory.read().clone())
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    Ok(self.normalize(path))
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    let path = self.normalize(path);
    let files = self.files.read();
    match files.get(&path) {
      None => Err(io::Error::new(io::ErrorKind::NotFound, "File not found")),
      Some(InMemoryFileSystemEntry::File { contents }) => Ok(contents.clone()),
      Some(InMemoryFileSystemEntry::Directory) => Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "Path is a directory",
      )),
    }
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    let path = self.normalize(path);
    let mut files = self.files.write();

    files.insert(
      path.clone(),
      InMemoryFileSystemEntry::File {
        contents: contents.to_vec(),
      },
    );

    let mut dir = path.parent();
    while let Some(path) = dir {
      files.insert(path.to_path_buf(), InMemoryFileSystemEntry::Directory);
      dir = path.parent();
    }

    Ok(())
  }

  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    let mut dir = Some(self.normalize(path));
    let mut files = self.files.write();
    while let Some(path) = dir {
      files.insert(path.clone(), InMemoryFileSystemEntry::Directory);
      dir = path.parent().map(Path::to_path_buf);
    }
    Ok(())
  }

  fn is_file(&self, path: &Path) -> bool {
    let path = self.normalize(path);
    let files = self.files.read();
    matches!(files.get(&path), Some(InMemoryFileSystemEntry::File { .. }))
  }

  fn is_dir(&self, path: &Path) -> bool {
    let path = self.normalize(path);
    let files = self.files.read();
    matches!(files.get(&path), Some(InMemoryFileSystemEntry::Directory))
  }
}
