//! Separator-agnostic path helpers.
//!
//! Bundle paths discovered on disk are compared and decomposed as strings.
//! Normalizing `\` to `/` first lets the same logic handle POSIX and
//! Windows-style inputs.

/// Lexically clean a path: `\` becomes `/`, repeated and trailing separators
/// are dropped, `.` segments vanish and `..` consumes its parent.
///
/// An empty result is `"."`; a rooted path that cleans to nothing is `"/"`.
pub fn clean(path: &str) -> String {
  let normalized = path.replace('\\', "/");
  if normalized.is_empty() {
    return ".".to_string();
  }

  let rooted = normalized.starts_with('/');
  let mut parts: Vec<&str> = Vec::new();

  for segment in normalized.split('/') {
    match segment {
      "" | "." => {}
      ".." => {
        if parts.last().is_some_and(|p| *p != "..") {
          parts.pop();
        } else if !rooted {
          parts.push("..");
        }
      }
      other => parts.push(other),
    }
  }

  let joined = parts.join("/");
  if rooted {
    format!("/{joined}")
  } else if joined.is_empty() {
    ".".to_string()
  } else {
    joined
  }
}

/// Last element of a path. `""` yields `"."`, an all-separator path `"/"`.
pub fn base(path: &str) -> String {
  let normalized = path.replace('\\', "/");
  if normalized.is_empty() {
    return ".".to_string();
  }

  let trimmed = normalized.trim_end_matches('/');
  if trimmed.is_empty() {
    return "/".to_string();
  }

  match trimmed.rfind('/') {
    Some(idx) => trimmed[idx + 1..].to_string(),
    None => trimmed.to_string(),
  }
}

/// Everything but the last element, cleaned. A path without a separator
/// yields `"."`.
pub fn dir(path: &str) -> String {
  let normalized = path.replace('\\', "/");
  match normalized.rfind('/') {
    Some(idx) => clean(&normalized[..=idx]),
    None => ".".to_string(),
  }
}
