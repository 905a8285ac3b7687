//! The `routes.json` file the binary is driven by, and the page shell it renders.
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use ssrpack_core::types::PageAssetUrls;
use ssrpack_core::types::Render;
use ssrpack_core::types::RenderBody;
use ssrpack_core::types::RouteDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteEntry {
  pub path: String,
  /// Client entry, relative to the project root
  pub hydrate_entry: PathBuf,
  #[serde(default)]
  pub title: Option<String>,
}

pub fn read_routes_file(path: &Path) -> anyhow::Result<Vec<RouteEntry>> {
  let contents = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read routes file {}", path.display()))?;
  let entries = serde_json::from_str(&contents)
    .with_context(|| format!("Invalid routes file {}", path.display()))?;
  Ok(entries)
}

pub fn route_definitions(entries: Vec<RouteEntry>) -> Vec<RouteDefinition> {
  entries
    .into_iter()
    .map(|entry| {
      let title = entry.title.unwrap_or_else(|| entry.path.clone());
      RouteDefinition::new(
        entry.path,
        entry.hydrate_entry,
        Arc::new(ShellRenderer { title }),
      )
    })
    .collect()
}

/// Renders an empty document that loads the page's styles and hydration scripts
#[derive(Debug)]
pub struct ShellRenderer {
  pub title: String,
}

impl ShellRenderer {
  pub fn document(&self, assets: &PageAssetUrls) -> String {
    let mut head = String::new();
    for url in &assets.css {
      head.push_str(&format!(
        "    <link rel=\"stylesheet\" href=\"{}\">\n",
        escape_html(url)
      ));
    }
    for url in &assets.js {
      head.push_str(&format!(
        "    <script type=\"module\" src=\"{}\"></script>\n",
        escape_html(url)
      ));
    }

    format!(
      "<!DOCTYPE html>\n<html>\n  <head>\n    <meta charset=\"utf-8\">\n    <title>{}</title>\n{head}  </head>\n  <body>\n    <div id=\"root\"></div>\n  </body>\n</html>\n",
      escape_html(&self.title)
    )
  }
}

#[async_trait]
impl Render for ShellRenderer {
  async fn render(&self, assets: &PageAssetUrls) -> anyhow::Result<RenderBody> {
    Ok(RenderBody::Text(self.document(assets)))
  }
}

fn escape_html(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for c in value.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      c => escaped.push(c),
    }
  }
  escaped
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_read_routes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    std::fs::write(
      &path,
      r#"[
        { "path": "/", "hydrateEntry": "src/home.tsx", "title": "Home" },
        { "path": "/users/:id", "hydrateEntry": "src/user.tsx" }
      ]"#,
    )
    .unwrap();

    assert_eq!(
      read_routes_file(&path).unwrap(),
      vec![
        RouteEntry {
          path: "/".into(),
          hydrate_entry: "src/home.tsx".into(),
          title: Some("Home".into()),
        },
        RouteEntry {
          path: "/users/:id".into(),
          hydrate_entry: "src/user.tsx".into(),
          title: None,
        },
      ]
    );
  }

  #[test]
  fn test_routes_file_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");

    let missing = read_routes_file(&path).unwrap_err();
    assert!(missing.to_string().contains("routes.json"));

    std::fs::write(&path, r#"[{ "path": "/" }]"#).unwrap();
    let invalid = read_routes_file(&path).unwrap_err();
    assert!(invalid.to_string().starts_with("Invalid routes file"));
  }

  #[test]
  fn test_route_definitions_default_title_to_path() {
    let routes = route_definitions(vec![RouteEntry {
      path: "/about".into(),
      hydrate_entry: "src/about.tsx".into(),
      title: None,
    }]);

    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path, "/about");
    assert_eq!(routes[0].entry_stem(), Some("about"));
  }

  #[tokio::test]
  async fn test_shell_references_assets_in_order() {
    let shell = ShellRenderer {
      title: "Tom & Jerry".into(),
    };
    let body = shell
      .render(&PageAssetUrls {
        css: vec!["/_client/a.css".into()],
        js: vec!["/_client/home-1.js".into(), "/_client/chunk-2.js".into()],
      })
      .await
      .unwrap();

    let RenderBody::Text(html) = body else {
      panic!("expected a text body");
    };
    assert!(html.contains("<title>Tom &amp; Jerry</title>"));
    let css = html.find("/_client/a.css").unwrap();
    let home = html.find("/_client/home-1.js").unwrap();
    let chunk = html.find("/_client/chunk-2.js").unwrap();
    assert!(css < home && home < chunk);
  }
}
