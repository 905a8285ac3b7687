use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use ssrpack_core::types::ArtifactKind;
use ssrpack_core::types::BuildArtifact;
use tokio::process::Command;

use crate::BuildConfig;
use crate::BuildOutput;
use crate::Bundler;
use crate::SourceMapMode;

/// Runs the `esbuild` executable and reads the emitted files back from its metafile
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
  binary: PathBuf,
}

impl Default for EsbuildBundler {
  fn default() -> Self {
    Self::new("esbuild")
  }
}

#[derive(Debug, Deserialize)]
struct Metafile {
  outputs: BTreeMap<String, MetafileOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafileOutput {
  bytes: u64,
  entry_point: Option<String>,
}

/// esbuild appends the extension itself
fn naming_template(template: &str) -> &str {
  template.strip_suffix(".[ext]").unwrap_or(template)
}

/// The `[hash]` segment esbuild put at the end of an output file stem
fn hash_from_file_name(path: &Path) -> String {
  path
    .file_stem()
    .and_then(|stem| stem.to_str())
    .and_then(|stem| stem.rsplit_once('-'))
    .map(|(_, hash)| hash.to_string())
    .unwrap_or_default()
}

impl EsbuildBundler {
  pub fn new(binary: impl Into<PathBuf>) -> Self {
    Self {
      binary: binary.into(),
    }
  }

  fn metafile_path(config: &BuildConfig) -> PathBuf {
    config.outdir.with_extension("meta.json")
  }

  fn args(&self, config: &BuildConfig, metafile: &Path) -> Vec<String> {
    let mut args = config
      .entrypoints
      .iter()
      .map(|entry| entry.display().to_string())
      .collect::<Vec<String>>();

    args.extend([
      "--bundle".to_string(),
      "--format=esm".to_string(),
      format!("--platform={}", config.target.as_str()),
      format!("--outdir={}", config.outdir.display()),
      format!("--entry-names={}", naming_template(&config.naming.entry)),
      format!("--chunk-names={}", naming_template(&config.naming.chunk)),
      format!("--asset-names={}", naming_template(&config.naming.asset)),
      format!("--metafile={}", metafile.display()),
      format!("--public-path={}", config.public_path),
      "--log-level=warning".to_string(),
    ]);

    if config.splitting {
      args.push("--splitting".to_string());
    }

    if config.minify {
      args.push("--minify".to_string());
    }

    match config.source_map {
      SourceMapMode::None => {}
      SourceMapMode::Linked => args.push("--sourcemap=linked".to_string()),
      SourceMapMode::External => args.push("--sourcemap=external".to_string()),
      SourceMapMode::Inline => args.push("--sourcemap=inline".to_string()),
    }

    for (key, value) in &config.define {
      args.push(format!("--define:{key}={value}"));
    }

    for external in &config.external {
      args.push(format!("--external:{external}"));
    }

    args
  }

  fn read_metafile(root: &Path, source: &str) -> anyhow::Result<Vec<BuildArtifact>> {
    let metafile: Metafile = serde_json::from_str(source)?;

    let artifacts = metafile
      .outputs
      .into_iter()
      .map(|(output, details)| {
        let output_path = root.join(output);
        let is_js = output_path.extension().is_some_and(|ext| ext == "js");
        let kind = match (is_js, details.entry_point.is_some()) {
          (true, true) => ArtifactKind::Entrypoint,
          (true, false) => ArtifactKind::Chunk,
          (false, _) => ArtifactKind::Asset,
        };

        BuildArtifact {
          content_hash: hash_from_file_name(&output_path),
          output_path,
          kind,
          size: details.bytes,
        }
      })
      .collect();

    Ok(artifacts)
  }
}

#[async_trait]
impl Bundler for EsbuildBundler {
  #[tracing::instrument(level = "debug", skip_all)]
  async fn build(&self, config: &BuildConfig) -> anyhow::Result<BuildOutput> {
    let metafile = Self::metafile_path(config);
    let args = self.args(config, &metafile);
    tracing::debug!(binary = %self.binary.display(), ?args, "Running esbuild");

    let output = Command::new(&self.binary)
      .args(&args)
      .current_dir(&config.root)
      .output()
      .await
      .map_err(|err| {
        anyhow::anyhow!(
          "Failed to run {}: {err}. Is esbuild installed?",
          self.binary.display()
        )
      })?;

    let logs = String::from_utf8_lossy(&output.stderr)
      .lines()
      .filter(|line| !line.trim().is_empty())
      .map(|line| line.to_string())
      .collect::<Vec<String>>();

    if !output.status.success() {
      return Ok(BuildOutput {
        success: false,
        logs,
        outputs: Vec::new(),
      });
    }

    let source = tokio::fs::read_to_string(&metafile).await?;
    let outputs = Self::read_metafile(&config.root, &source)?;
    tokio::fs::remove_file(&metafile).await?;

    Ok(BuildOutput {
      success: true,
      logs,
      outputs,
    })
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::BuildTarget;
  use crate::NamingTemplates;

  fn config() -> BuildConfig {
    BuildConfig {
      root: PathBuf::from("/app"),
      entrypoints: vec![PathBuf::from("/app/src/home.tsx")],
      outdir: PathBuf::from("/app/.ssrpack/client"),
      target: BuildTarget::Browser,
      naming: NamingTemplates::default(),
      splitting: true,
      minify: false,
      source_map: SourceMapMode::Linked,
      public_path: "/_client/".to_string(),
      define: BTreeMap::from([(
        "process.env.NODE_ENV".to_string(),
        "\"production\"".to_string(),
      )]),
      external: vec!["fsevents".to_string()],
    }
  }

  #[test]
  fn test_args() {
    let config = config();
    let bundler = EsbuildBundler::default();

    let args = bundler.args(&config, &EsbuildBundler::metafile_path(&config));

    assert_eq!(
      args,
      vec![
        "/app/src/home.tsx",
        "--bundle",
        "--format=esm",
        "--platform=browser",
        "--outdir=/app/.ssrpack/client",
        "--entry-names=[name]-[hash]",
        "--chunk-names=chunk-[hash]",
        "--asset-names=asset-[hash]",
        "--metafile=/app/.ssrpack/client.meta.json",
        "--public-path=/_client/",
        "--log-level=warning",
        "--splitting",
        "--sourcemap=linked",
        "--define:process.env.NODE_ENV=\"production\"",
        "--external:fsevents",
      ]
    );
  }

  #[test]
  fn test_target_selects_platform() {
    let mut config = config();
    config.target = BuildTarget::Neutral;

    let args = EsbuildBundler::default().args(&config, &EsbuildBundler::metafile_path(&config));

    assert!(args.contains(&"--platform=neutral".to_string()));
    assert!(!args.iter().any(|arg| arg == "--platform=browser"));
  }

  #[test]
  fn test_read_metafile() {
    let metafile = r#"{
      "inputs": {},
      "outputs": {
        ".ssrpack/client/home-AB12CD34.js": { "bytes": 10, "entryPoint": "src/home.tsx", "imports": [] },
        ".ssrpack/client/chunk-EF56GH78.js": { "bytes": 20, "imports": [] },
        ".ssrpack/client/home-IJ90KL12.css": { "bytes": 30, "imports": [] }
      }
    }"#;

    let artifacts = EsbuildBundler::read_metafile(Path::new("/app"), metafile).unwrap();

    assert_eq!(
      artifacts,
      vec![
        BuildArtifact {
          output_path: PathBuf::from("/app/.ssrpack/client/chunk-EF56GH78.js"),
          kind: ArtifactKind::Chunk,
          content_hash: "EF56GH78".to_string(),
          size: 20,
        },
        BuildArtifact {
          output_path: PathBuf::from("/app/.ssrpack/client/home-AB12CD34.js"),
          kind: ArtifactKind::Entrypoint,
          content_hash: "AB12CD34".to_string(),
          size: 10,
        },
        BuildArtifact {
          output_path: PathBuf::from("/app/.ssrpack/client/home-IJ90KL12.css"),
          kind: ArtifactKind::Asset,
          content_hash: "IJ90KL12".to_string(),
          size: 30,
        },
      ]
    );
  }

  #[tokio::test]
  async fn test_missing_binary_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.root = dir.path().to_path_buf();
    config.outdir = dir.path().join("client");

    let result = EsbuildBundler::new(dir.path().join("no-such-esbuild"))
      .build(&config)
      .await;

    assert!(result.is_err());
  }
}
