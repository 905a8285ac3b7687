use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use jwalk::WalkDir;
use rayon::prelude::*;
use ssrpack_core::types::JsAsset;
use ssrpack_core::types::JsAssetKind;

/// Route path to its ordered JavaScript assets
pub type JsByPage = IndexMap<String, Vec<JsAsset>>;

/// Static references between emitted JavaScript files, keyed by basename
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReferenceGraph {
  files: BTreeMap<String, PathBuf>,
  edges: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceGraph {
  /// Build the graph from `(path, contents)` pairs.
  ///
  /// `a` references `b` when the text of `a` contains `public_asset_path`
  /// immediately followed by the basename of `b`, unless that URL also appears
  /// as the argument of a dynamic `import()`. Dynamic imports load lazily at
  /// runtime and must not become script tags.
  ///
  /// This is a substring search, not a module graph. A basename that happens
  /// to appear inside an unrelated string is treated as a reference.
  pub fn from_sources(public_asset_path: &str, sources: &[(PathBuf, String)]) -> Self {
    let mut files = BTreeMap::new();
    for (path, _) in sources {
      let Some(basename) = basename(path) else {
        continue;
      };
      if files.contains_key(basename) {
        tracing::warn!(
          file = %path.display(),
          "Ignoring JavaScript file with a basename that was already seen"
        );
        continue;
      }
      files.insert(basename.to_string(), path.clone());
    }

    let edges = sources
      .par_iter()
      .filter_map(|(path, contents)| {
        let from = basename(path)?;
        if files.get(from) != Some(path) {
          return None;
        }

        let references = files
          .keys()
          .filter(|to| to.as_str() != from)
          .filter(|to| is_static_reference(contents, public_asset_path, to))
          .cloned()
          .collect::<BTreeSet<String>>();

        Some((from.to_string(), references))
      })
      .collect::<BTreeMap<String, BTreeSet<String>>>();

    Self { files, edges }
  }

  pub fn references(&self, basename: &str) -> impl Iterator<Item = &str> {
    self
      .edges
      .get(basename)
      .into_iter()
      .flat_map(|references| references.iter().map(|r| r.as_str()))
  }

  pub fn path_of(&self, basename: &str) -> Option<&Path> {
    self.files.get(basename).map(|path| path.as_path())
  }

  /// Every basename transitively reachable from `entry`, depth-first, excluding `entry`.
  pub fn transitive_references(&self, entry: &str) -> Vec<&str> {
    let mut visited = HashSet::from([entry]);
    let mut ordered = Vec::new();
    let mut stack = self.references(entry).collect::<Vec<_>>();
    stack.reverse();

    while let Some(current) = stack.pop() {
      if !visited.insert(current) {
        continue;
      }
      ordered.push(current);

      let mut next = self
        .references(current)
        .filter(|reference| !visited.contains(reference))
        .collect::<Vec<_>>();
      next.reverse();
      stack.extend(next);
    }

    ordered
  }
}

fn basename(path: &Path) -> Option<&str> {
  path.file_name().and_then(|name| name.to_str())
}

fn is_static_reference(contents: &str, public_asset_path: &str, basename: &str) -> bool {
  let url = format!("{public_asset_path}{basename}");
  if !contents.contains(&url) {
    return false;
  }

  let single_quoted = format!("import('{url}')");
  let double_quoted = format!("import(\"{url}\")");
  !contents.contains(&single_quoted) && !contents.contains(&double_quoted)
}

/// Every `.js` file under `dist_dir`, in sorted path order
pub(crate) fn collect_js_files(dist_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dist_dir).sort(true) {
    let entry = entry?;
    let path = entry.path();
    if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "js") {
      files.push(path);
    }
  }
  Ok(files)
}

/// Append the chunks each page's entrypoints statically depend on.
///
/// Every `.js` file under `dist_dir` is read once. For each page, a
/// depth-first closure over the [`ReferenceGraph`] starting at the page's
/// entrypoints yields the chunks to append. Chunks already listed for the page
/// (matched by URL) are not added again, so running this twice is a no-op.
/// The file system is only read.
#[tracing::instrument(level = "info", skip_all, fields(dist_dir = %dist_dir.display()))]
pub fn resolve_js_dependencies(
  dist_dir: &Path,
  public_asset_path: &str,
  js_by_page: &mut JsByPage,
) -> anyhow::Result<()> {
  let files = collect_js_files(dist_dir)?;
  let sources = files
    .into_par_iter()
    .map(|path| {
      let contents = std::fs::read_to_string(&path)?;
      Ok((path, contents))
    })
    .collect::<anyhow::Result<Vec<(PathBuf, String)>>>()?;

  let graph = ReferenceGraph::from_sources(public_asset_path, &sources);

  for (page, assets) in js_by_page.iter_mut() {
    let entrypoints = assets
      .iter()
      .filter(|asset| asset.kind == JsAssetKind::Entrypoint)
      .filter_map(|asset| basename(&asset.file_path).map(|name| name.to_string()))
      .collect::<Vec<_>>();

    for entry in &entrypoints {
      for reference in graph.transitive_references(entry) {
        let url_path = format!("{public_asset_path}{reference}");
        if assets.iter().any(|asset| asset.url_path == url_path) {
          continue;
        }

        let Some(file_path) = graph.path_of(reference) else {
          continue;
        };

        tracing::debug!(page = %page, chunk = %reference, "Attaching chunk dependency");
        assets.push(JsAsset {
          url_path,
          file_path: file_path.to_path_buf(),
          kind: JsAssetKind::Chunk,
        });
      }
    }
  }

  Ok(())
}
