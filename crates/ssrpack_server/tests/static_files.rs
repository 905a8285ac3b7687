use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use ssrpack_server::into_router;
use ssrpack_server::serve_static;
use ssrpack_server::BaseHeaders;
use ssrpack_server::StaticOptions;
use ssrpack_server::StaticStrategy;
use tower::ServiceExt;

const ORIGINAL: &str = ".button { color: rebeccapurple; background: white; }";

fn write_grouped_asset(dir: &Path) {
  std::fs::write(dir.join("style.css"), ORIGINAL).unwrap();
  std::fs::write(dir.join("style.css.br"), "brotli").unwrap();
  std::fs::write(dir.join("style.css.gz"), "gzip-bytes").unwrap();
}

fn router(dir: &Path, options: StaticOptions) -> Router {
  into_router(serve_static("/", dir, &options).unwrap())
}

async fn get(router: &Router, uri: &str, accept_encoding: Option<&str>) -> Response {
  let mut request = Request::builder().uri(uri);
  if let Some(accept_encoding) = accept_encoding {
    request = request.header(header::ACCEPT_ENCODING, accept_encoding);
  }
  router
    .clone()
    .oneshot(request.body(Body::empty()).unwrap())
    .await
    .unwrap()
}

async fn body_string(response: Response) -> String {
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_value<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
  response
    .headers()
    .get(name)
    .map(|value| value.to_str().unwrap())
}

#[tokio::test]
async fn negotiates_precompressed_variants() {
  for strategy in [StaticStrategy::Ram, StaticStrategy::Disk] {
    let dir = tempfile::tempdir().unwrap();
    write_grouped_asset(dir.path());
    let router = router(
      dir.path(),
      StaticOptions {
        strategy,
        ..Default::default()
      },
    );

    let cases = [
      (Some("br, gzip"), Some("br"), "brotli"),
      (Some("gzip"), Some("gzip"), "gzip-bytes"),
      (Some("deflate"), None, ORIGINAL),
      (None, None, ORIGINAL),
    ];

    for (accept_encoding, expected_encoding, expected_body) in cases {
      let response = get(&router, "/style.css", accept_encoding).await;

      assert_eq!(response.status(), StatusCode::OK);
      assert_eq!(header_value(&response, header::CONTENT_ENCODING), expected_encoding);
      assert_eq!(header_value(&response, header::CONTENT_TYPE), Some("text/css"));
      assert_eq!(header_value(&response, header::VARY), Some("accept-encoding"));
      let content_length = header_value(&response, header::CONTENT_LENGTH)
        .unwrap()
        .parse::<usize>()
        .unwrap();

      let body = body_string(response).await;
      assert_eq!(body, expected_body, "{strategy:?} {accept_encoding:?}");
      assert_eq!(content_length, body.len());
    }
  }
}

#[tokio::test]
async fn single_files_are_not_negotiated() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::create_dir_all(dir.path().join("nested")).unwrap();
  std::fs::write(dir.path().join("nested/data.json"), "{\"a\":1}").unwrap();

  let response = get(&router(dir.path(), StaticOptions::default()), "/nested/data.json", Some("br")).await;

  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(header_value(&response, header::CONTENT_ENCODING), None);
  assert_eq!(header_value(&response, header::VARY), None);
  assert_eq!(header_value(&response, header::CONTENT_TYPE), Some("application/json"));
  assert_eq!(header_value(&response, header::CONTENT_LENGTH), Some("7"));
  assert_eq!(body_string(response).await, "{\"a\":1}");
}

#[tokio::test]
async fn index_is_served_at_root() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
  std::fs::create_dir_all(dir.path().join("guide")).unwrap();
  std::fs::write(dir.path().join("guide/index.html"), "<h1>guide</h1>").unwrap();
  let router = router(dir.path(), StaticOptions::default());

  let root = get(&router, "/", None).await;
  assert_eq!(root.status(), StatusCode::OK);
  assert_eq!(
    header_value(&root, header::CONTENT_TYPE),
    Some("text/html")
  );
  assert_eq!(body_string(root).await, "<h1>home</h1>");

  assert_eq!(body_string(get(&router, "/guide/", None).await).await, "<h1>guide</h1>");
  assert_eq!(
    get(&router, "/unknown/path", None).await.status(),
    StatusCode::NOT_FOUND
  );
}

#[tokio::test]
async fn spa_mode_falls_back_to_index() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("index.html"), "<div id=app></div>").unwrap();
  std::fs::write(dir.path().join("app.js"), "boot()").unwrap();
  let router = router(
    dir.path(),
    StaticOptions {
      spa_mode: true,
      ..Default::default()
    },
  );

  for uri in ["/", "/settings/profile"] {
    let response = get(&router, uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<div id=app></div>");
  }
  assert_eq!(body_string(get(&router, "/app.js", None).await).await, "boot()");
}

#[tokio::test]
async fn base_headers_never_override_content_headers() {
  let dir = tempfile::tempdir().unwrap();
  write_grouped_asset(dir.path());
  let mut headers = HeaderMap::new();
  headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
  headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
  headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("zstd"));

  let router = router(
    dir.path(),
    StaticOptions {
      headers: BaseHeaders::Fixed(headers),
      ..Default::default()
    },
  );
  let response = get(&router, "/style.css", None).await;

  assert_eq!(header_value(&response, header::CACHE_CONTROL), Some("max-age=60"));
  assert_eq!(header_value(&response, header::CONTENT_TYPE), Some("text/css"));
  assert_eq!(header_value(&response, header::CONTENT_ENCODING), None);
}

#[tokio::test]
async fn per_file_base_headers() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("app-1a2b.js"), "a").unwrap();
  std::fs::write(dir.path().join("robots.txt"), "b").unwrap();

  let router = router(
    dir.path(),
    StaticOptions {
      headers: BaseHeaders::PerFile(Arc::new(|path: &Path| {
        let mut headers = HeaderMap::new();
        let hashed = path
          .file_name()
          .and_then(|name| name.to_str())
          .is_some_and(|name| name.contains('-'));
        let value = if hashed {
          "public, max-age=31536000, immutable"
        } else {
          "no-cache"
        };
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
        headers
      })),
      ..Default::default()
    },
  );

  assert_eq!(
    header_value(&get(&router, "/app-1a2b.js", None).await, header::CACHE_CONTROL),
    Some("public, max-age=31536000, immutable")
  );
  assert_eq!(
    header_value(&get(&router, "/robots.txt", None).await, header::CACHE_CONTROL),
    Some("no-cache")
  );
}

#[tokio::test]
async fn disk_read_failures_become_server_errors() {
  let dir = tempfile::tempdir().unwrap();
  write_grouped_asset(dir.path());
  let disk = router(
    dir.path(),
    StaticOptions {
      strategy: StaticStrategy::Disk,
      ..Default::default()
    },
  );
  let ram = router(dir.path(), StaticOptions::default());

  std::fs::remove_file(dir.path().join("style.css.br")).unwrap();

  assert_eq!(
    get(&disk, "/style.css", Some("br")).await.status(),
    StatusCode::INTERNAL_SERVER_ERROR
  );
  assert_eq!(
    get(&disk, "/style.css", Some("gzip")).await.status(),
    StatusCode::OK
  );
  assert_eq!(
    body_string(get(&ram, "/style.css", Some("br")).await).await,
    "brotli"
  );
}

#[tokio::test]
async fn assets_are_mounted_under_the_prefix() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("home-abc.js"), "home()").unwrap();

  let router = into_router(serve_static("/_client/", dir.path(), &StaticOptions::default()).unwrap());

  assert_eq!(
    body_string(get(&router, "/_client/home-abc.js", None).await).await,
    "home()"
  );
  assert_eq!(
    get(&router, "/home-abc.js", None).await.status(),
    StatusCode::NOT_FOUND
  );
}
