/// Collapse runs of `/` into a single slash.
pub fn collapse_slashes(path: &str) -> String {
  let mut out = String::with_capacity(path.len());
  let mut previous_slash = false;
  for c in path.chars() {
    if c == '/' {
      if previous_slash {
        continue;
      }
      previous_slash = true;
    } else {
      previous_slash = false;
    }
    out.push(c);
  }
  out
}

/// Join a route prefix and a relative path into a URL path.
///
/// The result always starts with `/` and never contains `//`.
pub fn join_url_path(prefix: &str, rest: &str) -> String {
  collapse_slashes(&format!("/{prefix}/{rest}"))
}
