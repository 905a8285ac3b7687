use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use ssrpack_core::types::PageAssetUrls;
use ssrpack_core::types::Render;
use ssrpack_core::types::RenderBody;
use ssrpack_core::types::RouteDefinition;
use ssrpack_core::Manifest;
use ssrpack_core::CLIENT_DIR_NAME;
use ssrpack_monitoring::NodeEnv;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::serve_static;
use crate::RouteTable;
use crate::SsrError;
use crate::StaticOptions;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone)]
pub struct SsrBundleOptions {
  /// Directory the bundle step wrote `manifest.json` and the client assets to
  pub bundle_dir: PathBuf,
  /// Negotiate response compression for rendered pages
  pub compress_response: bool,
  pub routes: Vec<RouteDefinition>,
  /// Render failures include their detail unless this is production
  pub node_env: NodeEnv,
  pub static_options: StaticOptions,
}

impl SsrBundleOptions {
  pub fn new(bundle_dir: impl Into<PathBuf>, routes: Vec<RouteDefinition>, node_env: NodeEnv) -> Self {
    Self {
      bundle_dir: bundle_dir.into(),
      compress_response: false,
      routes,
      node_env,
      static_options: StaticOptions::default(),
    }
  }
}

/// Handlers for every route of a bundle, keyed by path pattern
#[derive(Debug)]
pub struct SsrBundleHandlers {
  pub manifest: Manifest,
  pub route_handlers: RouteTable,
}

async fn render_page(
  render: Arc<dyn Render>,
  assets: Arc<PageAssetUrls>,
  expose_errors: bool,
) -> Response {
  match render.render(&assets).await {
    Ok(body) => {
      let body = match body {
        RenderBody::Text(text) => Body::from(text),
        RenderBody::Bytes(bytes) => Body::from(bytes),
        RenderBody::Stream(stream) => Body::from_stream(stream),
      };
      ([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], body).into_response()
    }
    Err(err) => {
      tracing::error!("Failed to render page: {err:?}");
      let message = if expose_errors {
        format!("Internal Server Error\n\n{err:?}")
      } else {
        "Internal Server Error".to_string()
      };
      (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
  }
}

/// Load the bundle manifest and build a handler for each of its routes.
///
/// The manifest is read and validated before anything else, so a missing,
/// malformed or outdated manifest fails here without building any handler.
/// Every manifest route must have a matching entry in `options.routes`.
/// Client assets are served under the manifest's `publicAssetPath` from the
/// bundle's client directory. Rendered routes take precedence over static
/// files with the same path.
#[tracing::instrument(level = "info", skip_all, fields(bundle_dir = %options.bundle_dir.display()))]
pub fn generate_ssr_bundle_handlers(
  options: SsrBundleOptions,
) -> Result<SsrBundleHandlers, SsrError> {
  let manifest = Manifest::read(&options.bundle_dir)?;

  let mut renders: HashMap<&str, Arc<dyn Render>> = HashMap::new();
  for route in &options.routes {
    if renders
      .insert(route.path.as_str(), route.render.clone())
      .is_some()
    {
      return Err(SsrError::DuplicateRoute(route.path.clone()));
    }
  }

  let mut route_handlers = serve_static(
    &manifest.public_asset_path,
    &options.bundle_dir.join(CLIENT_DIR_NAME),
    &options.static_options,
  )?;

  let expose_errors = !options.node_env.is_production();
  for route in &manifest.routes {
    let render = renders
      .get(route.path.as_str())
      .cloned()
      .ok_or_else(|| SsrError::MissingRender(route.path.clone()))?;
    let assets = Arc::new(PageAssetUrls::from(&route.assets));

    let mut handler = get(move || render_page(render.clone(), assets.clone(), expose_errors));
    if options.compress_response {
      handler = handler.layer(CompressionLayer::new());
    }

    if route_handlers.insert(route.path.clone(), handler).is_some() {
      tracing::warn!(path = %route.path, "Rendered route shadows a static file");
    }
  }

  tracing::info!(
    routes = manifest.routes.len(),
    handlers = route_handlers.len(),
    "Generated SSR handlers"
  );

  Ok(SsrBundleHandlers {
    manifest,
    route_handlers,
  })
}

enum RoutePattern {
  Fallback,
  Path(String),
}

/// Translate a route table pattern into axum's syntax
fn route_pattern(path: &str) -> RoutePattern {
  if path == "/*" {
    return RoutePattern::Fallback;
  }

  match path.strip_suffix("/*") {
    Some(prefix) => RoutePattern::Path(format!("{prefix}/*rest")),
    None => RoutePattern::Path(path.to_string()),
  }
}

impl SsrBundleHandlers {
  /// Mount every handler on an axum [`Router`] with request tracing.
  ///
  /// `/*` becomes the router fallback, any other trailing `/*` a wildcard segment.
  pub fn into_router(self) -> Router {
    into_router(self.route_handlers)
  }
}

pub fn into_router(route_handlers: RouteTable) -> Router {
  let mut router = Router::new();
  for (path, handler) in route_handlers {
    router = match route_pattern(&path) {
      RoutePattern::Fallback => router.fallback_service(handler),
      RoutePattern::Path(path) => router.route(&path, handler),
    };
  }

  router.layer(
    TraceLayer::new_for_http()
      .make_span_with(|request: &Request| {
        tracing::info_span!(
          "http_request",
          method = ?request.method(),
          uri = ?request.uri(),
        )
      })
      .on_response(|response: &Response, latency: Duration, _span: &Span| {
        tracing::info!(
          "{status} {latency:?}",
          status = response.status(),
          latency = latency,
        )
      }),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_route_pattern() {
    assert!(matches!(route_pattern("/*"), RoutePattern::Fallback));
    assert!(matches!(
      route_pattern("/docs/*"),
      RoutePattern::Path(path) if path == "/docs/*rest"
    ));
    assert!(matches!(
      route_pattern("/users/:id"),
      RoutePattern::Path(path) if path == "/users/:id"
    ));
  }
}
