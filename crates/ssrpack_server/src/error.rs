use std::path::PathBuf;

use ssrpack_core::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StaticFilesError {
  #[error("Cannot serve {}: not an existing directory", .0.display())]
  NotADirectory(PathBuf),
  #[error("Failed to list {}: {source}", .dir.display())]
  Walk {
    dir: PathBuf,
    #[source]
    source: anyhow::Error,
  },
  #[error("Failed to load {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Errors that prevent the server from starting
#[derive(Debug, Error)]
pub enum SsrError {
  #[error(transparent)]
  Manifest(#[from] ManifestError),
  #[error("Route {0:?} is in the manifest but no render was supplied for it")]
  MissingRender(String),
  #[error("Route {0:?} is defined more than once")]
  DuplicateRoute(String),
  #[error(transparent)]
  StaticFiles(#[from] StaticFilesError),
}
