use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// How a bundler output relates to the requested inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  /// Directly corresponds to one of the requested entrypoints
  Entrypoint,
  /// Code shared by, or split out from, one or more entrypoints
  Chunk,
  /// Anything else the bundler emitted (css, fonts, images, source maps)
  Asset,
}

/// A single file emitted by the bundler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifact {
  pub output_path: PathBuf,
  pub kind: ArtifactKind,
  /// The hash the bundler embedded in the output file name
  pub content_hash: String,
  pub size: u64,
}

impl BuildArtifact {
  pub fn is_css(&self) -> bool {
    has_extension(&self.output_path, "css")
  }

  pub fn is_js(&self) -> bool {
    has_extension(&self.output_path, "js")
  }

  pub fn file_name(&self) -> Option<&str> {
    self.output_path.file_name().and_then(|name| name.to_str())
  }

  /// The output file stem with the `-<hash>` suffix removed.
  ///
  /// `home-a1b2c3.js` with hash `a1b2c3` becomes `home`. When the hash is not
  /// present as a suffix the plain stem is returned.
  pub fn stem_without_hash(&self) -> Option<&str> {
    let stem = self.output_path.file_stem()?.to_str()?;
    if self.content_hash.is_empty() {
      return Some(stem);
    }

    Some(
      stem
        .strip_suffix(self.content_hash.as_str())
        .map(|stem| stem.trim_end_matches(['-', '.', '_']))
        .unwrap_or(stem),
    )
  }
}

fn has_extension(path: &Path, extension: &str) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
