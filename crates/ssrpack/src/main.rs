#![deny(unused_crate_dependencies)]

mod cmd;
mod routes;

use clap::Parser;
use clap::Subcommand;
use ssrpack_monitoring::NodeEnv;

#[derive(Debug, Subcommand)]
pub enum SsrpackCommandType {
  /// Bundle the client assets of every route and write the manifest
  Build(cmd::build::BuildCommand),
  /// Serve a bundle written by `build`
  Serve(cmd::serve::ServeCommand),
}

#[derive(Parser, Debug)]
#[command(name = "ssrpack", version)]
pub struct SsrpackCommand {
  #[clap(subcommand)]
  pub command: SsrpackCommandType,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = SsrpackCommand::parse();

  ssrpack_monitoring::initialize_from_env()?;
  let node_env = NodeEnv::from_env()?;

  match args.command {
    SsrpackCommandType::Build(cmd) => cmd::build::main(node_env, cmd).await,
    SsrpackCommandType::Serve(cmd) => cmd::serve::main(node_env, cmd).await,
  }
}
