use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::MethodRouter;
use bytes::Bytes;
use jwalk::WalkDir;
use ssrpack_core::types::Encoding;
use ssrpack_core::url::join_url_path;

use crate::negotiate_encoding;
use crate::StaticFilesError;

/// URL path pattern to the handler serving it
pub type RouteTable = BTreeMap<String, MethodRouter>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaticStrategy {
  /// Load every file into memory when the routes are built
  #[default]
  Ram,
  /// Read files from disk on every request
  Disk,
}

/// Headers applied to static responses before the content headers
#[derive(Clone, Default)]
pub enum BaseHeaders {
  #[default]
  None,
  Fixed(HeaderMap),
  /// Computed once per served file, from the path of its uncompressed variant
  PerFile(Arc<dyn Fn(&Path) -> HeaderMap + Send + Sync>),
}

impl BaseHeaders {
  fn for_file(&self, path: &Path) -> HeaderMap {
    match self {
      BaseHeaders::None => HeaderMap::new(),
      BaseHeaders::Fixed(headers) => headers.clone(),
      BaseHeaders::PerFile(headers) => headers(path),
    }
  }
}

impl Debug for BaseHeaders {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      BaseHeaders::None => f.write_str("None"),
      BaseHeaders::Fixed(headers) => f.debug_tuple("Fixed").field(headers).finish(),
      BaseHeaders::PerFile(_) => f.write_str("PerFile"),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct StaticOptions {
  pub strategy: StaticStrategy,
  /// Serve the root `index.html` for every path no other route matches
  pub spa_mode: bool,
  pub headers: BaseHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVariant {
  pub path: PathBuf,
  pub size: u64,
}

/// A file and its pre-compressed siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionVariantGroup {
  /// Path of the uncompressed file, relative to the served directory
  pub logical_path: PathBuf,
  pub identity: FileVariant,
  /// In [`Encoding::PRIORITY`] order
  pub encoded: Vec<(Encoding, FileVariant)>,
}

impl CompressionVariantGroup {
  pub fn encodings(&self) -> Vec<Encoding> {
    self.encoded.iter().map(|(encoding, _)| *encoding).collect()
  }
}

#[derive(Default)]
struct PendingGroup {
  identity: Option<FileVariant>,
  encoded: BTreeMap<Encoding, FileVariant>,
}

/// Group the files under `dir` by their name without a trailing `.br`, `.zst` or `.gz`.
///
/// A compressed file without its uncompressed sibling is not a variant of
/// anything and forms a group of its own under its literal name.
pub fn group_variants(dir: &Path) -> Result<Vec<CompressionVariantGroup>, StaticFilesError> {
  if !dir.is_dir() {
    return Err(StaticFilesError::NotADirectory(dir.to_path_buf()));
  }

  let mut pending: BTreeMap<PathBuf, PendingGroup> = BTreeMap::new();

  for entry in WalkDir::new(dir).sort(true) {
    let entry = entry.map_err(|err| StaticFilesError::Walk {
      dir: dir.to_path_buf(),
      source: err.into(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let path = entry.path();
    let size = entry
      .metadata()
      .map_err(|err| StaticFilesError::Walk {
        dir: dir.to_path_buf(),
        source: err.into(),
      })?
      .len();
    let Ok(relative) = path.strip_prefix(dir) else {
      continue;
    };
    let Some(file_name) = relative.file_name().and_then(|name| name.to_str()) else {
      tracing::warn!(file = %path.display(), "Skipping file with a non UTF-8 name");
      continue;
    };

    let (logical_name, encoding) = Encoding::split_file_name(file_name);
    let logical_path = relative.with_file_name(logical_name);
    let group = pending.entry(logical_path).or_default();
    let variant = FileVariant {
      path: path.clone(),
      size,
    };

    match encoding {
      Some(encoding) => {
        group.encoded.insert(encoding, variant);
      }
      None => group.identity = Some(variant),
    }
  }

  let mut groups = Vec::with_capacity(pending.len());
  for (logical_path, group) in pending {
    let encoded = Encoding::PRIORITY
      .into_iter()
      .filter_map(|encoding| {
        group
          .encoded
          .get(&encoding)
          .map(|variant| (encoding, variant.clone()))
      })
      .collect::<Vec<_>>();

    match group.identity {
      Some(identity) => groups.push(CompressionVariantGroup {
        logical_path,
        identity,
        encoded,
      }),
      None => {
        for (_, variant) in encoded {
          let logical_path = variant
            .path
            .strip_prefix(dir)
            .map(|path| path.to_path_buf())
            .unwrap_or_else(|_| variant.path.clone());
          groups.push(CompressionVariantGroup {
            logical_path,
            identity: variant,
            encoded: Vec::new(),
          });
        }
      }
    }
  }

  groups.sort_by(|a, b| a.logical_path.cmp(&b.logical_path));
  Ok(groups)
}

/// URL path a group is served at.
///
/// `index.html` is served at its directory. The root `index.html` becomes the
/// catch-all in SPA mode.
pub fn static_url_path(route_prefix: &str, logical_path: &Path, spa_mode: bool) -> String {
  let relative = logical_path
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/");

  match relative.strip_suffix("index.html") {
    Some("") if spa_mode => join_url_path(route_prefix, "*"),
    Some(dir) if dir.is_empty() || dir.ends_with('/') => join_url_path(route_prefix, dir),
    _ => join_url_path(route_prefix, &relative),
  }
}

struct ServedVariant {
  encoding: Option<Encoding>,
  path: PathBuf,
  /// Preloaded body under the RAM strategy
  contents: Option<Bytes>,
}

struct StaticFile {
  content_type: HeaderValue,
  base_headers: HeaderMap,
  identity: ServedVariant,
  encoded: Vec<ServedVariant>,
}

impl StaticFile {
  fn load(
    group: CompressionVariantGroup,
    options: &StaticOptions,
  ) -> Result<Self, StaticFilesError> {
    let load_variant = |encoding: Option<Encoding>,
                        variant: FileVariant|
     -> Result<ServedVariant, StaticFilesError> {
      let contents = match options.strategy {
        StaticStrategy::Ram => Some(Bytes::from(std::fs::read(&variant.path).map_err(
          |source| StaticFilesError::Read {
            path: variant.path.clone(),
            source,
          },
        )?)),
        StaticStrategy::Disk => None,
      };

      Ok(ServedVariant {
        encoding,
        path: variant.path,
        contents,
      })
    };

    let mime = mime_guess::from_path(&group.logical_path).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
      .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let base_headers = options.headers.for_file(&group.identity.path);

    let identity = load_variant(None, group.identity)?;
    let encoded = group
      .encoded
      .into_iter()
      .map(|(encoding, variant)| load_variant(Some(encoding), variant))
      .collect::<Result<Vec<_>, StaticFilesError>>()?;

    Ok(StaticFile {
      content_type,
      base_headers,
      identity,
      encoded,
    })
  }

  fn select(&self, accept_encoding: Option<&str>) -> &ServedVariant {
    let available = self
      .encoded
      .iter()
      .filter_map(|variant| variant.encoding)
      .collect::<Vec<_>>();

    negotiate_encoding(accept_encoding, &available)
      .and_then(|encoding| {
        self
          .encoded
          .iter()
          .find(|variant| variant.encoding == Some(encoding))
      })
      .unwrap_or(&self.identity)
  }

  async fn respond(&self, request_headers: &HeaderMap) -> Response {
    let accept_encoding = request_headers
      .get(header::ACCEPT_ENCODING)
      .and_then(|value| value.to_str().ok());
    let variant = self.select(accept_encoding);

    let body = match &variant.contents {
      Some(contents) => contents.clone(),
      None => match tokio::fs::read(&variant.path).await {
        Ok(contents) => Bytes::from(contents),
        Err(err) => {
          tracing::error!(file = %variant.path.display(), "Failed to read static file: {err}");
          return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
      },
    };

    let mut headers = self.base_headers.clone();
    headers.insert(header::CONTENT_TYPE, self.content_type.clone());
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    match variant.encoding {
      Some(encoding) => {
        headers.insert(
          header::CONTENT_ENCODING,
          HeaderValue::from_static(encoding.token()),
        );
      }
      None => {
        headers.remove(header::CONTENT_ENCODING);
      }
    }
    if !self.encoded.is_empty() {
      headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
    }

    let mut response = Response::new(Body::from(body));
    *response.headers_mut() = headers;
    response
  }
}

/// Build a route per file under `dir`, mounted below `route_prefix`.
///
/// Files with pre-compressed siblings negotiate `Accept-Encoding` per request.
/// Under [`StaticStrategy::Ram`] every variant is read up front and a read
/// failure fails the whole call. Under [`StaticStrategy::Disk`] a read failure
/// only fails the request it happened in.
#[tracing::instrument(level = "debug", skip_all, fields(route_prefix = %route_prefix, dir = %dir.display()))]
pub fn serve_static(
  route_prefix: &str,
  dir: &Path,
  options: &StaticOptions,
) -> Result<RouteTable, StaticFilesError> {
  let mut routes = RouteTable::new();

  for group in group_variants(dir)? {
    let url_path = static_url_path(route_prefix, &group.logical_path, options.spa_mode);
    tracing::debug!(
      url_path = %url_path,
      encodings = ?group.encodings(),
      "Serving static file"
    );

    let file = Arc::new(StaticFile::load(group, options)?);
    let handler = get(move |request_headers: HeaderMap| {
      let file = file.clone();
      async move { file.respond(&request_headers).await }
    });

    routes.insert(url_path, handler);
  }

  Ok(routes)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_static_url_path() {
    assert_eq!(static_url_path("/", Path::new("app.js"), false), "/app.js");
    assert_eq!(
      static_url_path("/_client/", Path::new("nested/app.js"), false),
      "/_client/nested/app.js"
    );
    assert_eq!(static_url_path("", Path::new("index.html"), false), "/");
    assert_eq!(static_url_path("/", Path::new("index.html"), true), "/*");
    assert_eq!(
      static_url_path("/docs", Path::new("guide/index.html"), true),
      "/docs/guide/"
    );
    assert_eq!(
      static_url_path("/", Path::new("notindex.html"), false),
      "/notindex.html"
    );
  }

  #[test]
  fn test_group_variants() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("app.js"), "0123456789").unwrap();
    std::fs::write(dir.path().join("app.js.gz"), "0123").unwrap();
    std::fs::write(dir.path().join("app.js.br"), "01").unwrap();
    std::fs::write(dir.path().join("nested/style.css"), "x").unwrap();
    std::fs::write(dir.path().join("archive.tar.gz"), "tar").unwrap();

    let groups = group_variants(dir.path()).unwrap();

    assert_eq!(
      groups
        .iter()
        .map(|group| (group.logical_path.clone(), group.encodings()))
        .collect::<Vec<_>>(),
      vec![
        (PathBuf::from("app.js"), vec![Encoding::Brotli, Encoding::Gzip]),
        (PathBuf::from("archive.tar.gz"), vec![]),
        (PathBuf::from("nested/style.css"), vec![]),
      ]
    );
    assert_eq!(groups[0].identity.size, 10);
    assert_eq!(groups[0].encoded[0].1.size, 2);
  }

  #[test]
  fn test_missing_directory() {
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
      serve_static("/", &dir.path().join("missing"), &StaticOptions::default()),
      Err(StaticFilesError::NotADirectory(_))
    ));
  }
}
