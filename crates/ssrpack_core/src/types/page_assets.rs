use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsAssetKind {
  Entrypoint,
  Chunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsAsset {
  pub url_path: String,
  pub file_path: PathBuf,
  pub kind: JsAssetKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CssAsset {
  pub url_path: String,
  pub file_path: PathBuf,
}

/// Ordered client assets of a single route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageAssets {
  pub js: Vec<JsAsset>,
  pub css: Vec<CssAsset>,
}

impl PageAssets {
  pub fn has_js_url(&self, url_path: &str) -> bool {
    self.js.iter().any(|asset| asset.url_path == url_path)
  }

  pub fn has_css_url(&self, url_path: &str) -> bool {
    self.css.iter().any(|asset| asset.url_path == url_path)
  }

  pub fn entrypoints(&self) -> impl Iterator<Item = &JsAsset> {
    self
      .js
      .iter()
      .filter(|asset| asset.kind == JsAssetKind::Entrypoint)
  }
}
