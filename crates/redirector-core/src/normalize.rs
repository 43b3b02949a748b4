//! Path and hostname normalization plus case-aware prefix comparison.
//!
//! Rule paths are stored without surrounding whitespace and without
//! leading or trailing `/`, so the root is the empty string. All prefix
//! checks are segment-aligned: `foo` is a path-prefix of `foo/bar` but not
//! of `foobar`.

/// Normalizes a rule or request path: trims whitespace, then slashes.
pub fn normalize_path(path: &str) -> &str {
    path.trim().trim_matches('/')
}

/// Normalizes a configured domain name for storage and lookup.
pub fn normalize_hostname(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

/// Strips a trailing `:port` from a `Host` header value.
///
/// Bracketed IPv6 literals keep their brackets; bare IPv6 addresses are
/// returned unchanged.
pub fn host_without_port(host: &str) -> &str {
    let host = host.trim();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    }
}

fn chars_match(a: char, b: char, fold_case: bool) -> bool {
    a == b || (fold_case && a.to_lowercase().eq(b.to_lowercase()))
}

/// Removes `prefix` from the start of `path`, comparing per character.
///
/// Returns the remainder of `path` (in its original casing) when the prefix
/// matches, `None` otherwise.
pub fn strip_path_prefix<'a>(path: &'a str, prefix: &str, fold_case: bool) -> Option<&'a str> {
    if !fold_case {
        return path.strip_prefix(prefix);
    }

    let mut rest = path.char_indices();
    for expected in prefix.chars() {
        match rest.next() {
            Some((_, actual)) if chars_match(actual, expected, true) => {}
            _ => return None,
        }
    }

    let offset = rest.next().map(|(i, _)| i).unwrap_or(path.len());
    Some(&path[offset..])
}

/// Compares two normalized paths.
pub fn paths_equal(a: &str, b: &str, fold_case: bool) -> bool {
    matches!(strip_path_prefix(a, b, fold_case), Some(rest) if rest.is_empty())
}

/// Returns true if `path` lies strictly below `prefix` in the path tree.
///
/// The root (empty prefix) contains every non-root path.
pub fn is_nested_under(path: &str, prefix: &str, fold_case: bool) -> bool {
    if prefix.is_empty() {
        return !path.is_empty();
    }

    matches!(strip_path_prefix(path, prefix, fold_case), Some(rest) if rest.starts_with('/'))
}

/// Returns true if `prefix` equals `path` or is a segment-aligned prefix of it.
pub fn is_path_prefix(prefix: &str, path: &str, fold_case: bool) -> bool {
    paths_equal(path, prefix, fold_case) || is_nested_under(path, prefix, fold_case)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/foo/bar/"), "foo/bar");
        assert_eq!(normalize_path("  /foo  "), "foo");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("//a//"), "a");
    }

    #[test]
    fn test_normalize_hostname() {
        assert_eq!(normalize_hostname(" Example.TEST. "), "example.test");
    }

    #[test]
    fn test_host_without_port() {
        assert_eq!(host_without_port("example.test:8080"), "example.test");
        assert_eq!(host_without_port("example.test"), "example.test");
        assert_eq!(host_without_port("[::1]:8080"), "[::1]");
        assert_eq!(host_without_port("::1"), "::1");
        assert_eq!(host_without_port("example.test:"), "example.test:");
    }

    #[test]
    fn test_strip_path_prefix_folds_case() {
        assert_eq!(strip_path_prefix("FOO/bar", "foo", true), Some("/bar"));
        assert_eq!(strip_path_prefix("FOO/bar", "foo", false), None);
        assert_eq!(strip_path_prefix("ÄPFEL/x", "äpfel", true), Some("/x"));
        assert_eq!(strip_path_prefix("fo", "foo", true), None);
    }

    #[test]
    fn test_prefix_is_segment_aligned() {
        assert!(is_path_prefix("foo", "foo/bar", false));
        assert!(is_path_prefix("foo", "foo", false));
        assert!(!is_path_prefix("foo", "foobar", false));
        assert!(!is_path_prefix("foo/bar", "foo", false));
        assert!(is_path_prefix("", "anything/at/all", false));
    }

    #[test]
    fn test_nested_is_strict() {
        assert!(is_nested_under("foo/bar", "foo", false));
        assert!(!is_nested_under("foo", "foo", false));
        assert!(is_nested_under("Foo/Bar", "foo", true));
        assert!(!is_nested_under("Foo/Bar", "foo", false));
        assert!(!is_nested_under("", "", false));
        assert!(is_nested_under("a", "", false));
    }
}
