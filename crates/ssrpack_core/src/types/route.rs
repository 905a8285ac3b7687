use std::fmt::Debug;
use std::fmt::Formatter;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use super::Render;

/// A server-rendered route and the client entry that hydrates it
#[derive(Clone)]
pub struct RouteDefinition {
  /// URL path pattern, unique across a route set
  pub path: String,
  pub render: Arc<dyn Render>,
  /// Source file handed to the bundler as this route's client entrypoint
  pub hydrate_entry_path: PathBuf,
}

impl RouteDefinition {
  pub fn new(
    path: impl Into<String>,
    hydrate_entry_path: impl Into<PathBuf>,
    render: Arc<dyn Render>,
  ) -> Self {
    Self {
      path: path.into(),
      render,
      hydrate_entry_path: hydrate_entry_path.into(),
    }
  }

  /// File stem of the hydration entry, used to match bundler outputs back to routes
  pub fn entry_stem(&self) -> Option<&str> {
    entry_stem(&self.hydrate_entry_path)
  }
}

impl Debug for RouteDefinition {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RouteDefinition")
      .field("path", &self.path)
      .field("hydrate_entry_path", &self.hydrate_entry_path)
      .finish_non_exhaustive()
  }
}

pub fn entry_stem(path: &Path) -> Option<&str> {
  path.file_stem().and_then(|stem| stem.to_str())
}
