use clap::Parser;
use clap::ValueEnum;
use ssrpack_bundler::bundle_dir_path;
use ssrpack_monitoring::NodeEnv;
use ssrpack_server::generate_ssr_bundle_handlers;
use ssrpack_server::SsrBundleOptions;
use ssrpack_server::StaticStrategy;

use super::ProjectArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
  /// Hold every client asset in memory
  Ram,
  /// Read client assets from disk per request
  Disk,
}

impl From<StrategyArg> for StaticStrategy {
  fn from(value: StrategyArg) -> Self {
    match value {
      StrategyArg::Ram => StaticStrategy::Ram,
      StrategyArg::Disk => StaticStrategy::Disk,
    }
  }
}

#[derive(Debug, Parser)]
pub struct ServeCommand {
  #[command(flatten)]
  pub project: ProjectArgs,

  #[arg(long, default_value = "127.0.0.1")]
  pub host: String,

  #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
  pub port: u16,

  /// Compress rendered pages for clients that accept it
  #[arg(long)]
  pub compress_response: bool,

  #[arg(long, value_enum, default_value_t = StrategyArg::Ram)]
  pub strategy: StrategyArg,
}

pub async fn main(node_env: NodeEnv, cmd: ServeCommand) -> anyhow::Result<()> {
  let routes = cmd.project.load_routes()?;
  let bundle_dir = bundle_dir_path(&cmd.project.root, cmd.project.dev);

  let mut options = SsrBundleOptions::new(bundle_dir, routes, node_env);
  options.compress_response = cmd.compress_response;
  options.static_options.strategy = cmd.strategy.into();
  let router = generate_ssr_bundle_handlers(options)?.into_router();

  let listener = tokio::net::TcpListener::bind((cmd.host.as_str(), cmd.port)).await?;
  tracing::info!(%node_env, "Listening on http://{}", listener.local_addr()?);
  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  tracing::info!("Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    tracing::error!("Failed to listen for ctrl-c: {err}");
    std::future::pending::<()>().await;
  }
}
