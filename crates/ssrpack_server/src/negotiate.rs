use ssrpack_core::types::Encoding;

/// A coding listed in `Accept-Encoding` with its quality value
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedCoding {
  pub token: String,
  pub quality: f32,
}

/// Parse an `Accept-Encoding` header value.
///
/// Tokens are lowercased. A missing or malformed `q` parameter counts as 1.
pub fn parse_accept_encoding(header: &str) -> Vec<AcceptedCoding> {
  header
    .split(',')
    .filter_map(|item| {
      let mut parts = item.split(';');
      let token = parts.next()?.trim().to_ascii_lowercase();
      if token.is_empty() {
        return None;
      }

      let quality = parts
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
        .and_then(|(_, value)| value.trim().parse::<f32>().ok())
        .unwrap_or(1.0);

      Some(AcceptedCoding { token, quality })
    })
    .collect()
}

fn quality_of(accepted: &[AcceptedCoding], encoding: Encoding) -> Option<f32> {
  let matches_token = |coding: &&AcceptedCoding| {
    coding.token == encoding.token() || (encoding == Encoding::Gzip && coding.token == "x-gzip")
  };

  accepted
    .iter()
    .find(matches_token)
    .or_else(|| accepted.iter().find(|coding| coding.token == "*"))
    .map(|coding| coding.quality)
}

/// Pick the encoding to serve among those `available`.
///
/// Candidates are tried in [`Encoding::PRIORITY`] order, not by quality: the
/// first one the client accepts with a non-zero quality wins. `*` accepts any
/// coding not listed explicitly. `None` means the identity representation.
pub fn negotiate_encoding(accept_encoding: Option<&str>, available: &[Encoding]) -> Option<Encoding> {
  let accepted = parse_accept_encoding(accept_encoding?);

  Encoding::PRIORITY
    .into_iter()
    .filter(|encoding| available.contains(encoding))
    .find(|encoding| quality_of(&accepted, *encoding).is_some_and(|quality| quality > 0.0))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  const ALL: [Encoding; 3] = Encoding::PRIORITY;

  #[test]
  fn test_parse_accept_encoding() {
    assert_eq!(
      parse_accept_encoding("gzip, BR;q=0.5 , zstd;q=0,,identity;q=bad"),
      vec![
        AcceptedCoding {
          token: "gzip".into(),
          quality: 1.0
        },
        AcceptedCoding {
          token: "br".into(),
          quality: 0.5
        },
        AcceptedCoding {
          token: "zstd".into(),
          quality: 0.0
        },
        AcceptedCoding {
          token: "identity".into(),
          quality: 1.0
        },
      ]
    );
  }

  #[test]
  fn test_priority_beats_quality() {
    assert_eq!(
      negotiate_encoding(Some("gzip;q=1, br;q=0.1"), &ALL),
      Some(Encoding::Brotli)
    );
    assert_eq!(
      negotiate_encoding(Some("br, gzip"), &ALL),
      Some(Encoding::Brotli)
    );
    assert_eq!(
      negotiate_encoding(Some("gzip, zstd"), &ALL),
      Some(Encoding::Zstd)
    );
  }

  #[test]
  fn test_only_available_encodings_are_chosen() {
    assert_eq!(
      negotiate_encoding(Some("br, gzip"), &[Encoding::Gzip]),
      Some(Encoding::Gzip)
    );
    assert_eq!(negotiate_encoding(Some("br"), &[Encoding::Gzip]), None);
  }

  #[test]
  fn test_zero_quality_refuses() {
    assert_eq!(
      negotiate_encoding(Some("br;q=0, gzip"), &ALL),
      Some(Encoding::Gzip)
    );
    assert_eq!(negotiate_encoding(Some("*, br;q=0"), &[Encoding::Brotli]), None);
  }

  #[test]
  fn test_wildcard_and_aliases() {
    assert_eq!(negotiate_encoding(Some("*"), &ALL), Some(Encoding::Brotli));
    assert_eq!(
      negotiate_encoding(Some("x-gzip"), &ALL),
      Some(Encoding::Gzip)
    );
  }

  #[test]
  fn test_missing_or_empty_header_is_identity() {
    assert_eq!(negotiate_encoding(None, &ALL), None);
    assert_eq!(negotiate_encoding(Some(""), &ALL), None);
    assert_eq!(negotiate_encoding(Some("identity"), &ALL), None);
  }
}
