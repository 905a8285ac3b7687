use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

/// A content coding ssrpack pre-compresses assets with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
  Brotli,
  Zstd,
  Gzip,
}

impl Encoding {
  /// All encodings, most preferred first
  pub const PRIORITY: [Encoding; 3] = [Encoding::Brotli, Encoding::Zstd, Encoding::Gzip];

  /// File extension of the pre-compressed sibling, without the dot
  pub fn extension(&self) -> &'static str {
    match self {
      Encoding::Brotli => "br",
      Encoding::Zstd => "zst",
      Encoding::Gzip => "gz",
    }
  }

  /// Token used in `Accept-Encoding` and `Content-Encoding`
  pub fn token(&self) -> &'static str {
    match self {
      Encoding::Brotli => "br",
      Encoding::Zstd => "zstd",
      Encoding::Gzip => "gzip",
    }
  }

  pub fn from_extension(extension: &str) -> Option<Self> {
    match extension {
      "br" => Some(Encoding::Brotli),
      "zst" => Some(Encoding::Zstd),
      "gz" => Some(Encoding::Gzip),
      _ => None,
    }
  }

  /// Splits `app.js.br` into `("app.js", Some(Brotli))`.
  ///
  /// At most one trailing compression extension is removed.
  pub fn split_file_name(file_name: &str) -> (&str, Option<Encoding>) {
    if let Some((logical, extension)) = file_name.rsplit_once('.') {
      if let Some(encoding) = Encoding::from_extension(extension) {
        if !logical.is_empty() {
          return (logical, Some(encoding));
        }
      }
    }
    (file_name, None)
  }

  /// Path of the sibling file holding this encoding of `path`
  pub fn sibling_path(&self, path: &Path) -> std::path::PathBuf {
    let mut file_name = path.as_os_str().to_owned();
    file_name.push(".");
    file_name.push(self.extension());
    file_name.into()
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;

  #[test]
  fn test_split_file_name() {
    assert_eq!(
      Encoding::split_file_name("app.js.br"),
      ("app.js", Some(Encoding::Brotli))
    );
    assert_eq!(
      Encoding::split_file_name("app.js.zst"),
      ("app.js", Some(Encoding::Zstd))
    );
    assert_eq!(
      Encoding::split_file_name("app.js.gz.gz"),
      ("app.js.gz", Some(Encoding::Gzip))
    );
    assert_eq!(Encoding::split_file_name("app.js"), ("app.js", None));
    assert_eq!(Encoding::split_file_name(".gz"), (".gz", None));
  }

  #[test]
  fn test_sibling_path() {
    assert_eq!(
      Encoding::Zstd.sibling_path(Path::new("/dist/app.js")),
      PathBuf::from("/dist/app.js.zst")
    );
  }
}
