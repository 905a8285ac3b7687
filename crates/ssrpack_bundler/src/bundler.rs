use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use ssrpack_core::types::BuildArtifact;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
  #[default]
  Browser,
  /// No browser or node globals assumed, for code shared with workers
  Neutral,
}

impl BuildTarget {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildTarget::Browser => "browser",
      BuildTarget::Neutral => "neutral",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
  #[default]
  None,
  Linked,
  External,
  Inline,
}

/// Output file name templates. `[name]`, `[hash]` and `[ext]` are substituted by the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplates {
  pub entry: String,
  pub chunk: String,
  pub asset: String,
}

impl Default for NamingTemplates {
  fn default() -> Self {
    Self {
      entry: "[name]-[hash].[ext]".to_string(),
      chunk: "chunk-[hash].[ext]".to_string(),
      asset: "asset-[hash].[ext]".to_string(),
    }
  }
}

/// Everything a bundler needs to produce the client assets of one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  /// Directory relative paths are resolved against
  pub root: PathBuf,
  pub entrypoints: Vec<PathBuf>,
  pub outdir: PathBuf,
  pub target: BuildTarget,
  pub naming: NamingTemplates,
  pub splitting: bool,
  pub minify: bool,
  pub source_map: SourceMapMode,
  /// Prefix the bundler writes in front of cross-chunk references
  pub public_path: String,
  /// Identifier replacements, values are JavaScript expressions
  pub define: BTreeMap<String, String>,
  pub external: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
  pub success: bool,
  pub logs: Vec<String>,
  pub outputs: Vec<BuildArtifact>,
}

/// A JavaScript bundler ssrpack delegates module resolution, transpilation,
/// code splitting and minification to.
///
/// Implementations report every emitted file with its kind and the hash they
/// embedded in its name. A build that ran but failed is reported with
/// `success: false`; `Err` is reserved for failures to run the bundler at all.
#[async_trait]
pub trait Bundler: Debug + Send + Sync {
  async fn build(&self, config: &BuildConfig) -> anyhow::Result<BuildOutput>;
}
