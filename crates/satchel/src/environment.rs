use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::LazyLock;

use anyhow::Context;
use regex::{Captures, Regex};
use satchel_core::types::{BuildMode, SatchelOptions};
use satchel_filesystem::FileSystemRef;

static PROCESS_ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"process\.env\.([A-Za-z_$][A-Za-z0-9_$]*)")
    .unwrap_or_else(|err| panic!("invalid process.env pattern: {err}"))
});

/// The environment values substituted into script output.
///
/// Values passed in the build options represent the process environment and
/// always win; an env file only fills in keys that are not already set.
/// `NODE_ENV` defaults to the build mode when neither source provides it.
#[derive(Clone, Debug, Default)]
pub struct Environment {
  values: BTreeMap<String, String>,
}

impl Environment {
  pub fn new(options: &SatchelOptions, fs: &FileSystemRef) -> anyhow::Result<Self> {
    let mut values = options.env.clone();

    if let Some(env_file) = &options.env_file {
      let bytes = fs
        .read(env_file)
        .with_context(|| format!("Failed to read env file '{}'", env_file.display()))?;

      for item in dotenvy::from_read_iter(Cursor::new(bytes)) {
        let (key, value) =
          item.with_context(|| format!("Failed to parse env file '{}'", env_file.display()))?;
        values.entry(key).or_insert(value);
      }
    }

    values
      .entry(String::from("NODE_ENV"))
      .or_insert_with(|| match options.mode {
        BuildMode::Development => String::from("development"),
        BuildMode::Production => String::from("production"),
      });

    Ok(Environment { values })
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(|value| value.as_str())
  }

  /// Replaces `process.env.KEY` references with string literals for known
  /// keys. Unknown keys are left as written.
  pub fn substitute(&self, code: &str) -> String {
    PROCESS_ENV_RE
      .replace_all(code, |captures: &Captures| {
        let key = &captures[1];
        match self.values.get(key) {
          Some(value) => {
            serde_json::to_string(value).unwrap_or_else(|_| captures[0].to_string())
          }
          None => captures[0].to_string(),
        }
      })
      .into_owned()
  }
}
