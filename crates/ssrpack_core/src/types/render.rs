use std::fmt::Debug;
use std::fmt::Formatter;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::Serialize;

/// Asset URLs handed to a page renderer, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAssetUrls {
  pub css: Vec<String>,
  pub js: Vec<String>,
}

/// Output of a page render
pub enum RenderBody {
  Text(String),
  Bytes(Bytes),
  Stream(BoxStream<'static, std::io::Result<Bytes>>),
}

impl Debug for RenderBody {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RenderBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
      RenderBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
      RenderBody::Stream(_) => f.write_str("Stream"),
    }
  }
}

impl From<String> for RenderBody {
  fn from(value: String) -> Self {
    RenderBody::Text(value)
  }
}

impl From<&'static str> for RenderBody {
  fn from(value: &'static str) -> Self {
    RenderBody::Text(value.to_string())
  }
}

impl From<Bytes> for RenderBody {
  fn from(value: Bytes) -> Self {
    RenderBody::Bytes(value)
  }
}

/// Renders a page to an HTML document.
///
/// The document is opaque to ssrpack; it only hands over the asset lists the
/// page has to reference.
#[async_trait]
pub trait Render: Send + Sync {
  async fn render(&self, assets: &PageAssetUrls) -> anyhow::Result<RenderBody>;
}

/// Adapts an async closure into a [`Render`] implementation
pub struct RenderFn<F>(pub F);

#[async_trait]
impl<F, Fut> Render for RenderFn<F>
where
  F: Fn(PageAssetUrls) -> Fut + Send + Sync,
  Fut: Future<Output = anyhow::Result<RenderBody>> + Send,
{
  async fn render(&self, assets: &PageAssetUrls) -> anyhow::Result<RenderBody> {
    (self.0)(assets.clone()).await
  }
}
