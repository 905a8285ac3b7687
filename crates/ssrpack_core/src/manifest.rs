//! The build to serve handoff.
//!
//! The bundle step writes a [`Manifest`] to `<bundle dir>/manifest.json`. The
//! server reads it back at start-up and refuses to run against a manifest
//! written by a different schema version.
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::types::PageAssetUrls;

/// Bumped whenever the manifest schema changes shape
pub const MANIFEST_VERSION: u32 = 1;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Directory inside the bundle directory holding the client assets
pub const CLIENT_DIR_NAME: &str = "client";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
  pub version: u32,
  pub public_asset_path: String,
  pub routes: Vec<ManifestRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestRoute {
  pub path: String,
  pub assets: ManifestAssets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestAssets {
  pub js: Vec<String>,
  pub css: Vec<String>,
}

impl From<&ManifestAssets> for PageAssetUrls {
  fn from(assets: &ManifestAssets) -> Self {
    PageAssetUrls {
      css: assets.css.clone(),
      js: assets.js.clone(),
    }
  }
}

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("No manifest found at {}. Run the bundle step before starting the server", .0.display())]
  NotFound(PathBuf),
  #[error("Failed to read manifest at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Manifest is not valid JSON: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("Manifest version mismatch: expected {expected}, found {}", .found.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()))]
  VersionMismatch { expected: u32, found: Option<u64> },
  #[error("Invalid manifest: {0}")]
  Invalid(String),
}

impl Manifest {
  pub fn new(public_asset_path: impl Into<String>, routes: Vec<ManifestRoute>) -> Self {
    Self {
      version: MANIFEST_VERSION,
      public_asset_path: public_asset_path.into(),
      routes,
    }
  }

  pub fn path_in(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join(MANIFEST_FILE_NAME)
  }

  /// Parse and validate a manifest.
  ///
  /// The version is checked before the rest of the document so that a manifest
  /// written by another schema reports the mismatch rather than a shape error.
  pub fn from_json(source: &str) -> Result<Self, ManifestError> {
    let value: serde_json::Value = serde_json::from_str(source)?;
    let found = value.get("version").and_then(|version| version.as_u64());
    if found != Some(u64::from(MANIFEST_VERSION)) {
      return Err(ManifestError::VersionMismatch {
        expected: MANIFEST_VERSION,
        found,
      });
    }

    let manifest: Manifest = serde_json::from_value(value)?;
    manifest.validate()?;
    Ok(manifest)
  }

  pub fn to_json(&self) -> Result<String, ManifestError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn read(bundle_dir: &Path) -> Result<Self, ManifestError> {
    let path = Self::path_in(bundle_dir);
    if !path.is_file() {
      return Err(ManifestError::NotFound(path));
    }

    let source =
      std::fs::read_to_string(&path).map_err(|source| ManifestError::Io { path, source })?;
    Self::from_json(&source)
  }

  pub fn write(&self, bundle_dir: &Path) -> Result<PathBuf, ManifestError> {
    let path = Self::path_in(bundle_dir);
    std::fs::write(&path, self.to_json()?).map_err(|source| ManifestError::Io {
      path: path.clone(),
      source,
    })?;
    Ok(path)
  }

  pub fn validate(&self) -> Result<(), ManifestError> {
    if self.version != MANIFEST_VERSION {
      return Err(ManifestError::VersionMismatch {
        expected: MANIFEST_VERSION,
        found: Some(u64::from(self.version)),
      });
    }

    if !self.public_asset_path.starts_with('/') || !self.public_asset_path.ends_with('/') {
      return Err(ManifestError::Invalid(format!(
        "publicAssetPath must start and end with '/', got {:?}",
        self.public_asset_path
      )));
    }

    let mut seen = HashSet::new();
    for route in &self.routes {
      if !route.path.starts_with('/') {
        return Err(ManifestError::Invalid(format!(
          "route path must start with '/', got {:?}",
          route.path
        )));
      }

      if !seen.insert(route.path.as_str()) {
        return Err(ManifestError::Invalid(format!(
          "duplicate route path {:?}",
          route.path
        )));
      }

      let urls = route.assets.js.iter().chain(route.assets.css.iter());
      for url in urls {
        if !url.starts_with(&self.public_asset_path) {
          return Err(ManifestError::Invalid(format!(
            "asset {url:?} of route {:?} is not under {:?}",
            route.path, self.public_asset_path
          )));
        }
      }
    }

    Ok(())
  }

  pub fn route(&self, path: &str) -> Option<&ManifestRoute> {
    self.routes.iter().find(|route| route.path == path)
  }
}
