use std::path::PathBuf;

use ssrpack_compression::CompressionError;
use ssrpack_core::ManifestError;
use thiserror::Error;

/// Errors that abort a build
#[derive(Debug, Error)]
pub enum BundleError {
  #[error("Route {0:?} is defined more than once")]
  DuplicateRoute(String),
  #[error("Route {route:?} has an invalid hydration entry {}", .entry.display())]
  InvalidEntry { route: String, entry: PathBuf },
  #[error("The bundler failed:\n{}", .logs.join("\n"))]
  BuildFailed { logs: Vec<String> },
  #[error("No route matches bundler output {}", .0.display())]
  NoRouteForOutput(PathBuf),
  #[error("No JavaScript entrypoint was emitted for route {0:?}")]
  MissingEntrypoint(String),
  #[error("No stylesheet was emitted for route {0:?}")]
  MissingStylesheet(String),
  #[error("Route {route:?} has no {kind} entry in the build state")]
  InconsistentState { route: String, kind: &'static str },
  #[error(transparent)]
  Bundler(anyhow::Error),
  #[error(transparent)]
  Manifest(#[from] ManifestError),
  #[error(transparent)]
  Compression(#[from] CompressionError),
  #[error(transparent)]
  Other(#[from] anyhow::Error),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}
