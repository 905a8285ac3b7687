use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use clap::ValueEnum;
use ssrpack_bundler::bundle;
use ssrpack_bundler::BundleOptions;
use ssrpack_bundler::BundleOutcome;
use ssrpack_bundler::EsbuildBundler;
use ssrpack_bundler::SourceMapMode;
use ssrpack_bundler::DEFAULT_PUBLIC_ASSET_PATH;
use ssrpack_core::url::join_url_path;
use ssrpack_monitoring::NodeEnv;

use super::ProjectArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceMapArg {
  None,
  Linked,
  External,
  Inline,
}

impl From<SourceMapArg> for SourceMapMode {
  fn from(value: SourceMapArg) -> Self {
    match value {
      SourceMapArg::None => SourceMapMode::None,
      SourceMapArg::Linked => SourceMapMode::Linked,
      SourceMapArg::External => SourceMapMode::External,
      SourceMapArg::Inline => SourceMapMode::Inline,
    }
  }
}

#[derive(Debug, Parser)]
pub struct BuildCommand {
  #[command(flatten)]
  pub project: ProjectArgs,

  /// Write gzip, brotli and zstd siblings of the client assets
  #[arg(long)]
  pub compress: bool,

  /// Minify client code [default: true unless --dev]
  #[arg(long, num_args = 0..=1, default_missing_value = "true")]
  pub minify: Option<bool>,

  #[arg(long, value_enum, default_value_t = SourceMapArg::None)]
  pub source_map: SourceMapArg,

  /// URL prefix the client assets are served under
  #[arg(long, default_value = DEFAULT_PUBLIC_ASSET_PATH)]
  pub public_path: String,

  /// Module specifiers left out of the client bundle
  #[arg(long)]
  pub external: Vec<String>,

  /// Replace a global identifier in client code, as KEY=VALUE
  #[arg(long = "define", value_parser = parse_define)]
  pub define: Vec<(String, String)>,

  /// Bundler executable
  #[arg(long, env = "SSRPACK_ESBUILD", default_value = "esbuild")]
  pub esbuild: PathBuf,
}

pub fn parse_define(value: &str) -> Result<(String, String), String> {
  match value.split_once('=') {
    Some((key, replacement)) if !key.is_empty() => {
      Ok((key.to_string(), replacement.to_string()))
    }
    _ => Err(format!("expected KEY=VALUE but got {value:?}")),
  }
}

impl BuildCommand {
  pub fn bundle_options(&self, node_env: NodeEnv) -> BundleOptions {
    let mut options = BundleOptions::new(
      self.project.root.clone(),
      Arc::new(EsbuildBundler::new(self.esbuild.clone())),
    );
    options.public_asset_path = join_url_path(&self.public_path, "");
    options.dev = self.project.dev;
    options.minify = self.minify.unwrap_or(!self.project.dev);
    options.source_map = self.source_map.into();
    options.compress = self.compress;
    options.node_env = node_env.as_str().to_string();
    options.define = self.define.iter().cloned().collect::<BTreeMap<_, _>>();
    options.external = self.external.clone();
    options
  }
}

pub async fn main(node_env: NodeEnv, cmd: BuildCommand) -> anyhow::Result<()> {
  let start_time = Instant::now();
  let routes = cmd.project.load_routes()?;
  let options = cmd.bundle_options(node_env);

  match bundle(&routes, &options).await? {
    BundleOutcome::NothingToDo => {
      tracing::warn!(
        "{} lists no routes, nothing was bundled",
        cmd.project.routes.display()
      );
    }
    BundleOutcome::Bundled(summary) => {
      tracing::info!(
        manifest = %summary.manifest_path.display(),
        routes = summary.manifest.routes.len(),
        "Bundled in {:.2?}",
        start_time.elapsed()
      );
    }
  }

  Ok(())
}
