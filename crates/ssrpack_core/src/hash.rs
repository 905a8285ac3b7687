use xxhash_rust::xxh3::xxh3_64;

/// Content hashes end up in emitted file names, so they must be stable across
/// runs, machines, platforms and versions.
pub fn hash_bytes(s: &[u8]) -> String {
  let res = xxh3_64(s);
  format!("{:016x}", res)
}

pub fn hash_string(s: &str) -> String {
  hash_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_is_stable_and_fixed_width() {
    let first = hash_bytes(b"body { color: red }");
    let second = hash_string("body { color: red }");

    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_hash_differs_by_content() {
    assert_ne!(hash_string("a"), hash_string("b"));
  }
}
