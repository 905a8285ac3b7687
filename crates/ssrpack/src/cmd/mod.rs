pub mod build;
pub mod serve;

use std::path::PathBuf;

use clap::Args;
use ssrpack_core::types::RouteDefinition;

use crate::routes::read_routes_file;
use crate::routes::route_definitions;

#[derive(Debug, Args)]
pub struct ProjectArgs {
  /// JSON file listing `{ path, hydrateEntry, title? }` for every route
  #[arg(long, default_value = "routes.json")]
  pub routes: PathBuf,

  /// Project root, hydrate entries are resolved against it
  #[arg(long, default_value = ".")]
  pub root: PathBuf,

  /// Use the development bundle directory
  #[arg(long)]
  pub dev: bool,
}

impl ProjectArgs {
  pub fn load_routes(&self) -> anyhow::Result<Vec<RouteDefinition>> {
    Ok(route_definitions(read_routes_file(&self.routes)?))
  }
}
