use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use indexmap::IndexSet;
use ssrpack_compression::compress_files_in_dir;
use ssrpack_compression::CompressionOptions;
use ssrpack_core::hash::hash_bytes;
use ssrpack_core::types::ArtifactKind;
use ssrpack_core::types::BuildArtifact;
use ssrpack_core::types::CssAsset;
use ssrpack_core::types::JsAsset;
use ssrpack_core::types::JsAssetKind;
use ssrpack_core::types::RouteDefinition;
use ssrpack_core::Manifest;
use ssrpack_core::ManifestAssets;
use ssrpack_core::ManifestRoute;
use ssrpack_core::CLIENT_DIR_NAME;

use crate::fix_duplicate_exports_in_directory;
use crate::resolve_js_dependencies;
use crate::BuildConfig;
use crate::BuildTarget;
use crate::BundleError;
use crate::Bundler;
use crate::ExportFixOutcome;
use crate::JsByPage;
use crate::NamingTemplates;
use crate::SourceMapMode;

pub const DEFAULT_PUBLIC_ASSET_PATH: &str = "/_client/";

/// Environment variables starting with this prefix are inlined into client code
pub const DEFAULT_ENV_PREFIX: &str = "PUBLIC_";

/// Bundle directory for iterative builds, kept under `node_modules` so file watchers ignore it
pub const DEV_BUNDLE_DIR: &str = "node_modules/.ssrpack";

pub const PROD_BUNDLE_DIR: &str = ".ssrpack";

#[derive(Debug, Clone)]
pub struct BundleOptions {
  pub project_root: PathBuf,
  pub bundler: Arc<dyn Bundler>,
  /// URL prefix the client assets are served under. Starts and ends with `/`
  pub public_asset_path: String,
  pub dev: bool,
  pub target: BuildTarget,
  pub minify: bool,
  pub source_map: SourceMapMode,
  /// Write pre-compressed siblings of the client assets
  pub compress: bool,
  pub compression: CompressionOptions,
  pub fix_duplicate_exports: bool,
  /// Value inlined for `process.env.NODE_ENV`
  pub node_env: String,
  pub define: BTreeMap<String, String>,
  pub env_prefix: Option<String>,
  pub external: Vec<String>,
}

impl BundleOptions {
  pub fn new(project_root: impl Into<PathBuf>, bundler: Arc<dyn Bundler>) -> Self {
    Self {
      project_root: project_root.into(),
      bundler,
      public_asset_path: DEFAULT_PUBLIC_ASSET_PATH.to_string(),
      dev: false,
      target: BuildTarget::default(),
      minify: true,
      source_map: SourceMapMode::None,
      compress: false,
      compression: CompressionOptions::default(),
      fix_duplicate_exports: true,
      node_env: "production".to_string(),
      define: BTreeMap::new(),
      env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
      external: Vec::new(),
    }
  }

  pub fn bundle_dir(&self) -> PathBuf {
    bundle_dir_path(&self.project_root, self.dev)
  }
}

pub fn bundle_dir_path(project_root: &Path, dev: bool) -> PathBuf {
  if dev {
    project_root.join(DEV_BUNDLE_DIR)
  } else {
    project_root.join(PROD_BUNDLE_DIR)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
  pub bundle_dir: PathBuf,
  pub manifest_path: PathBuf,
  pub manifest: Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
  /// No routes were given
  NothingToDo,
  Bundled(BundleSummary),
}

/// Per-route assets collected over one [`bundle`] call
#[derive(Debug, Default)]
struct BuildState {
  js_by_page: JsByPage,
  css_by_page: IndexMap<String, Vec<CssAsset>>,
  /// Canonical CSS files in emission order
  css_files: IndexSet<String>,
}

impl BuildState {
  fn new(routes: &[RouteDefinition]) -> Self {
    let mut state = BuildState::default();
    for route in routes {
      state.js_by_page.insert(route.path.clone(), Vec::new());
      state.css_by_page.insert(route.path.clone(), Vec::new());
    }
    state
  }
}

/// `process.env.*` replacements for the client build.
///
/// `process.env.NODE_ENV` is always defined. Variables whose name starts with
/// `env_prefix` are inlined with their current value. Entries in `define` win.
pub fn client_defines(
  node_env: &str,
  env_prefix: Option<&str>,
  vars: impl IntoIterator<Item = (String, String)>,
  define: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
  let mut defines = BTreeMap::new();
  defines.insert("process.env.NODE_ENV".to_string(), json_string(node_env));

  if let Some(prefix) = env_prefix.filter(|prefix| !prefix.is_empty()) {
    for (key, value) in vars {
      if key.starts_with(prefix) {
        defines.insert(format!("process.env.{key}"), json_string(&value));
      }
    }
  }

  defines.extend(define.iter().map(|(k, v)| (k.clone(), v.clone())));
  defines
}

/// The process environment, minus entries that are not valid UTF-8
fn utf8_env_vars() -> Vec<(String, String)> {
  std::env::vars_os()
    .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
      (Ok(key), Ok(value)) => Some((key, value)),
      (key, _) => {
        tracing::debug!(
          key = %key.unwrap_or_else(|key| key.to_string_lossy().into_owned()),
          "Skipping environment variable that is not valid UTF-8"
        );
        None
      }
    })
    .collect()
}

fn json_string(value: &str) -> String {
  serde_json::Value::String(value.to_string()).to_string()
}

fn validate_routes(routes: &[RouteDefinition]) -> Result<(), BundleError> {
  let mut seen = HashSet::new();
  for route in routes {
    if !seen.insert(route.path.as_str()) {
      return Err(BundleError::DuplicateRoute(route.path.clone()));
    }

    if route.entry_stem().map_or(true, |stem| stem.is_empty()) {
      return Err(BundleError::InvalidEntry {
        route: route.path.clone(),
        entry: route.hydrate_entry_path.clone(),
      });
    }
  }
  Ok(())
}

/// URL of a file inside the client directory
fn asset_url(client_dir: &Path, public_asset_path: &str, file: &Path) -> anyhow::Result<String> {
  let relative = file.strip_prefix(client_dir).map_err(|_| {
    anyhow::anyhow!(
      "Bundler output {} is outside of {}",
      file.display(),
      client_dir.display()
    )
  })?;

  let relative = relative
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/");

  Ok(format!("{public_asset_path}{relative}"))
}

async fn reset_dir(dir: &Path) -> std::io::Result<()> {
  if tokio::fs::try_exists(dir).await? {
    tokio::fs::remove_dir_all(dir).await?;
  }
  tokio::fs::create_dir_all(dir).await
}

/// Move a CSS output to `<content hash>.css`, collapsing identical files onto one
async fn canonicalize_css(client_dir: &Path, artifact: &BuildArtifact) -> std::io::Result<PathBuf> {
  let contents = tokio::fs::read(&artifact.output_path).await?;
  let canonical = client_dir.join(format!("{}.css", hash_bytes(&contents)));

  if canonical == artifact.output_path {
    return Ok(canonical);
  }

  if tokio::fs::try_exists(&canonical).await? {
    tokio::fs::remove_file(&artifact.output_path).await?;
  } else {
    tokio::fs::rename(&artifact.output_path, &canonical).await?;
  }

  Ok(canonical)
}

fn routes_for_stem<'a>(
  routes: &'a [RouteDefinition],
  stem: &'a str,
) -> impl Iterator<Item = &'a RouteDefinition> + 'a {
  routes
    .iter()
    .filter(move |route| route.entry_stem() == Some(stem))
}

async fn assign_outputs(
  routes: &[RouteDefinition],
  outputs: &[BuildArtifact],
  client_dir: &Path,
  public_asset_path: &str,
  state: &mut BuildState,
) -> Result<(), BundleError> {
  for artifact in outputs {
    let stem = artifact.stem_without_hash().unwrap_or_default();

    if artifact.kind == ArtifactKind::Entrypoint && artifact.is_js() {
      let url_path = asset_url(client_dir, public_asset_path, &artifact.output_path)?;
      let mut matched = false;
      for route in routes_for_stem(routes, stem) {
        matched = true;
        let assets = state.js_by_page.entry(route.path.clone()).or_default();
        if !assets.iter().any(|asset| asset.url_path == url_path) {
          assets.push(JsAsset {
            url_path: url_path.clone(),
            file_path: artifact.output_path.clone(),
            kind: JsAssetKind::Entrypoint,
          });
        }
      }

      if !matched {
        return Err(BundleError::NoRouteForOutput(artifact.output_path.clone()));
      }
      continue;
    }

    if artifact.is_css() {
      let file_path = canonicalize_css(client_dir, artifact).await?;
      let url_path = asset_url(client_dir, public_asset_path, &file_path)?;
      state.css_files.insert(url_path.clone());

      let mut matched = false;
      for route in routes_for_stem(routes, stem) {
        matched = true;
        let assets = state.css_by_page.entry(route.path.clone()).or_default();
        if !assets.iter().any(|asset| asset.url_path == url_path) {
          assets.push(CssAsset {
            url_path: url_path.clone(),
            file_path: file_path.clone(),
          });
        }
      }

      if !matched {
        tracing::debug!(
          output = %artifact.output_path.display(),
          "No route matches CSS output, leaving it unassigned"
        );
      }
    }
  }

  Ok(())
}

/// A single stylesheet for the whole build is shared by every route without one
fn apply_common_styles(client_dir: &Path, state: &mut BuildState) {
  if state.css_files.len() != 1 {
    return;
  }
  let Some(url_path) = state.css_files.first().cloned() else {
    return;
  };
  let Some(file_name) = url_path.rsplit('/').next() else {
    return;
  };
  let file_path = client_dir.join(file_name);

  for (page, assets) in state.css_by_page.iter_mut() {
    if assets.is_empty() {
      tracing::debug!(page = %page, css = %url_path, "Assigning common stylesheet");
      assets.push(CssAsset {
        url_path: url_path.clone(),
        file_path: file_path.clone(),
      });
    }
  }
}

fn build_manifest(
  routes: &[RouteDefinition],
  public_asset_path: &str,
  state: &BuildState,
) -> Result<Manifest, BundleError> {
  let mut manifest_routes = Vec::with_capacity(routes.len());

  for route in routes {
    let js = state
      .js_by_page
      .get(&route.path)
      .ok_or_else(|| BundleError::InconsistentState {
        route: route.path.clone(),
        kind: "js",
      })?;
    let css = state
      .css_by_page
      .get(&route.path)
      .ok_or_else(|| BundleError::InconsistentState {
        route: route.path.clone(),
        kind: "css",
      })?;

    if !js.iter().any(|asset| asset.kind == JsAssetKind::Entrypoint) {
      return Err(BundleError::MissingEntrypoint(route.path.clone()));
    }
    if css.is_empty() {
      return Err(BundleError::MissingStylesheet(route.path.clone()));
    }

    manifest_routes.push(ManifestRoute {
      path: route.path.clone(),
      assets: ManifestAssets {
        js: js.iter().map(|asset| asset.url_path.clone()).collect(),
        css: css.iter().map(|asset| asset.url_path.clone()).collect(),
      },
    });
  }

  let manifest = Manifest::new(public_asset_path, manifest_routes);
  manifest.validate()?;
  Ok(manifest)
}

/// Build the client assets of `routes` and write their manifest.
///
/// The stages run strictly one after the other: bundle, resolve chunk
/// dependencies, fix duplicate exports, compress, write the manifest. Any
/// failure aborts the build. The client directory is emptied first so stale
/// assets from a previous build never end up in the manifest.
#[tracing::instrument(level = "info", skip_all, fields(routes = routes.len()))]
pub async fn bundle(
  routes: &[RouteDefinition],
  options: &BundleOptions,
) -> Result<BundleOutcome, BundleError> {
  if routes.is_empty() {
    tracing::info!("No routes to bundle");
    return Ok(BundleOutcome::NothingToDo);
  }

  validate_routes(routes)?;

  let start = Instant::now();
  let bundle_dir = options.bundle_dir();
  let client_dir = bundle_dir.join(CLIENT_DIR_NAME);
  reset_dir(&client_dir).await?;

  let mut entrypoints = Vec::new();
  for route in routes {
    let entry = options.project_root.join(&route.hydrate_entry_path);
    if !entrypoints.contains(&entry) {
      entrypoints.push(entry);
    }
  }

  let config = BuildConfig {
    root: options.project_root.clone(),
    entrypoints,
    outdir: client_dir.clone(),
    target: options.target,
    naming: NamingTemplates::default(),
    splitting: true,
    minify: options.minify,
    source_map: options.source_map,
    public_path: options.public_asset_path.clone(),
    define: client_defines(
      &options.node_env,
      options.env_prefix.as_deref(),
      utf8_env_vars(),
      &options.define,
    ),
    external: options.external.clone(),
  };

  let stage = Instant::now();
  let output = options
    .bundler
    .build(&config)
    .await
    .map_err(BundleError::Bundler)?;
  for line in &output.logs {
    tracing::debug!("bundler: {line}");
  }
  if !output.success {
    return Err(BundleError::BuildFailed { logs: output.logs });
  }
  tracing::info!(
    outputs = output.outputs.len(),
    elapsed = ?stage.elapsed(),
    "Bundled client entrypoints"
  );

  let mut state = BuildState::new(routes);
  assign_outputs(
    routes,
    &output.outputs,
    &client_dir,
    &options.public_asset_path,
    &mut state,
  )
  .await?;
  apply_common_styles(&client_dir, &mut state);

  let stage = Instant::now();
  let resolve_dir = client_dir.clone();
  let public_asset_path = options.public_asset_path.clone();
  let mut js_by_page = std::mem::take(&mut state.js_by_page);
  state.js_by_page = tokio::task::spawn_blocking(move || {
    resolve_js_dependencies(&resolve_dir, &public_asset_path, &mut js_by_page)?;
    anyhow::Ok(js_by_page)
  })
  .await
  .map_err(anyhow::Error::from)??;
  tracing::info!(elapsed = ?stage.elapsed(), "Resolved chunk dependencies");

  if options.fix_duplicate_exports {
    let stage = Instant::now();
    let fix_dir = client_dir.clone();
    let reports =
      tokio::task::spawn_blocking(move || fix_duplicate_exports_in_directory(&fix_dir))
        .await
        .map_err(anyhow::Error::from)??;
    let fixed = reports
      .iter()
      .filter(|report| matches!(report.outcome, ExportFixOutcome::Fixed { .. }))
      .count();
    let failed = reports
      .iter()
      .filter(|report| matches!(report.outcome, ExportFixOutcome::Failed(_)))
      .count();
    tracing::info!(fixed, failed, elapsed = ?stage.elapsed(), "Checked duplicate exports");
  }

  if options.compress {
    compress_files_in_dir(&client_dir, &options.compression).await?;
  }

  let manifest = build_manifest(routes, &options.public_asset_path, &state)?;
  let manifest_path = manifest.write(&bundle_dir)?;

  tracing::info!(
    bundle_dir = %bundle_dir.display(),
    elapsed = ?start.elapsed(),
    "Wrote bundle manifest"
  );

  Ok(BundleOutcome::Bundled(BundleSummary {
    bundle_dir,
    manifest_path,
    manifest,
  }))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use ssrpack_core::types::PageAssetUrls;
  use ssrpack_core::types::RenderBody;
  use ssrpack_core::types::RenderFn;

  use super::*;

  fn route(path: &str, entry: &str) -> RouteDefinition {
    RouteDefinition::new(
      path,
      entry,
      Arc::new(RenderFn(|_: PageAssetUrls| async {
        Ok::<_, anyhow::Error>(RenderBody::from(""))
      })),
    )
  }

  #[test]
  fn test_bundle_dir_path() {
    let root = Path::new("/app");

    assert_eq!(
      bundle_dir_path(root, true),
      PathBuf::from("/app/node_modules/.ssrpack")
    );
    assert_eq!(bundle_dir_path(root, false), PathBuf::from("/app/.ssrpack"));
  }

  #[test]
  fn test_client_defines() {
    let defines = client_defines(
      "production",
      Some("PUBLIC_"),
      vec![
        ("PUBLIC_API".to_string(), "https://api".to_string()),
        ("SECRET".to_string(), "hunter2".to_string()),
      ],
      &BTreeMap::from([("__DEV__".to_string(), "false".to_string())]),
    );

    assert_eq!(
      defines,
      BTreeMap::from([
        ("__DEV__".to_string(), "false".to_string()),
        (
          "process.env.NODE_ENV".to_string(),
          "\"production\"".to_string()
        ),
        (
          "process.env.PUBLIC_API".to_string(),
          "\"https://api\"".to_string()
        ),
      ])
    );
  }

  #[test]
  fn test_client_defines_without_prefix_only_defines_node_env() {
    let defines = client_defines(
      "development",
      None,
      vec![("PUBLIC_API".to_string(), "x".to_string())],
      &BTreeMap::new(),
    );

    assert_eq!(defines.len(), 1);
    assert_eq!(defines["process.env.NODE_ENV"], "\"development\"");
  }

  #[test]
  fn test_validate_routes() {
    assert!(validate_routes(&[route("/", "src/home.tsx"), route("/a", "src/a.tsx")]).is_ok());
    assert!(matches!(
      validate_routes(&[route("/", "src/home.tsx"), route("/", "src/other.tsx")]),
      Err(BundleError::DuplicateRoute(path)) if path == "/"
    ));
    assert!(matches!(
      validate_routes(&[route("/", "")]),
      Err(BundleError::InvalidEntry { .. })
    ));
  }

  #[test]
  fn test_asset_url_uses_forward_slashes() {
    let client = Path::new("/b/client");

    assert_eq!(
      asset_url(client, "/_client/", &client.join("nested").join("a-1.js")).unwrap(),
      "/_client/nested/a-1.js"
    );
    assert!(asset_url(client, "/_client/", Path::new("/elsewhere/a.js")).is_err());
  }

  #[test]
  fn test_missing_entrypoint_is_fatal() {
    let routes = vec![route("/", "src/home.tsx")];
    let state = BuildState::new(&routes);

    assert!(matches!(
      build_manifest(&routes, "/_client/", &state),
      Err(BundleError::MissingEntrypoint(path)) if path == "/"
    ));
  }

  #[test]
  fn test_missing_stylesheet_is_fatal() {
    let routes = vec![route("/", "src/home.tsx")];
    let mut state = BuildState::new(&routes);
    state.js_by_page.insert(
      "/".to_string(),
      vec![JsAsset {
        url_path: "/_client/home-abc.js".to_string(),
        file_path: PathBuf::from("home-abc.js"),
        kind: JsAssetKind::Entrypoint,
      }],
    );

    assert!(matches!(
      build_manifest(&routes, "/_client/", &state),
      Err(BundleError::MissingStylesheet(path)) if path == "/"
    ));
  }

  #[cfg(unix)]
  #[test]
  fn test_env_vars_skip_invalid_unicode() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::env::set_var("SSRPACK_TEST_VALID_VAR", "ok");
    std::env::set_var(
      "SSRPACK_TEST_INVALID_VAR",
      OsStr::from_bytes(&[0x66, 0x6f, 0x80]),
    );

    let vars = utf8_env_vars();

    assert!(vars.contains(&("SSRPACK_TEST_VALID_VAR".to_string(), "ok".to_string())));
    assert!(!vars.iter().any(|(key, _)| key == "SSRPACK_TEST_INVALID_VAR"));

    std::env::remove_var("SSRPACK_TEST_VALID_VAR");
    std::env::remove_var("SSRPACK_TEST_INVALID_VAR");
  }

  #[test]
  fn test_route_missing_from_state_is_inconsistent() {
    let routes = vec![route("/", "src/home.tsx")];
    let state = BuildState::default();

    assert!(matches!(
      build_manifest(&routes, "/_client/", &state),
      Err(BundleError::InconsistentState { kind: "js", .. })
    ));
  }

  #[tokio::test]
  #[tracing_test::traced_test]
  async fn test_unmatched_css_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let routes = vec![route("/", "src/home.tsx")];
    let output_path = dir.path().join("vendor-abc.css");
    std::fs::write(&output_path, "a { color: red }").unwrap();
    let mut state = BuildState::new(&routes);

    assign_outputs(
      &routes,
      &[BuildArtifact {
        output_path,
        kind: ArtifactKind::Asset,
        content_hash: "abc".to_string(),
        size: 16,
      }],
      dir.path(),
      "/_client/",
      &mut state,
    )
    .await
    .unwrap();

    assert!(state.css_by_page["/"].is_empty());
    assert_eq!(state.css_files.len(), 1);
    assert!(logs_contain("No route matches CSS output"));

    apply_common_styles(dir.path(), &mut state);
    assert_eq!(state.css_by_page["/"].len(), 1);
  }
}
