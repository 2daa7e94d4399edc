use std::path::PathBuf;

/// A dependency specifier could not be mapped to a file.
///
/// Fatal for required dependencies; optional dependencies are logged and
/// skipped instead of surfacing this error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("Failed to resolve '{specifier}' from '{}'", from.display())]
pub struct ResolutionError {
  pub specifier: String,
  pub from: PathBuf,
}

/// A transformer plugin failed on an asset. Always fatal.
#[derive(Debug, thiserror::Error)]
#[error("Failed to transform '{}'", file_path.display())]
pub struct TransformError {
  pub file_path: PathBuf,
  #[source]
  pub source: anyhow::Error,
}

/// Internal-consistency failure in the bundling phase.
///
/// This should never occur in correct operation; seeing one indicates a
/// defect in graph construction or bundle placement.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("Bundling invariant violated: {0}")]
pub struct BundlingInvariantViolation(pub String);
