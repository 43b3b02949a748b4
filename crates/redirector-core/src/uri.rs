//! URI decomposition for nginx-style locations and rewrite targets.
//!
//! Only a constrained subset of nginx syntax is understood: an optional
//! `^...$` anchor pair, a trailing `(.*)` capture, and the `$1`, `$args`
//! and `$is_args$args` substitutions at the very end of the path. Anything
//! else that looks dynamic is rejected with a [`ParseError`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

static POSITIONAL_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\d+").expect("Invalid regex pattern"));

const CAPTURE_ALL: &str = "(.*)";

/// Result of decomposing a URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposedUri {
    /// Path with an optional `scheme://host` prefix, tokens removed.
    pub uri: String,
    /// The URI ended in `$1`: append the captured subpath.
    pub append_subpath: bool,
    /// The URI ended in `(.*)`: match every nested path.
    pub match_subpaths: bool,
    /// The URI forwarded `$args`.
    pub pass_query_string: bool,
}

/// Recognized trailing tokens, checked in order. Each entry is
/// `(suffix, append_subpath, match_subpaths, pass_query_string)`.
const SUFFIXES: [(&str, bool, bool, bool); 5] = [
    ("$1$is_args$args", true, false, true),
    ("$1", true, false, false),
    (CAPTURE_ALL, false, true, false),
    ("$is_args$args", false, false, true),
    ("$args", false, false, true),
];

/// Components of a split URI reference. The fragment is dropped.
#[derive(Debug, Default, PartialEq, Eq)]
struct UriParts<'a> {
    scheme: &'a str,
    host: &'a str,
    path: &'a str,
    query: &'a str,
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn split_uri(raw: &str) -> UriParts<'_> {
    let mut parts = UriParts::default();
    let mut rest = raw;

    if let Some((scheme, after)) = rest.split_once(':') {
        if is_scheme(scheme) {
            parts.scheme = scheme;
            rest = after;
        }
    }

    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        parts.host = &after[..end];
        rest = &after[end..];
    }

    if let Some((before, _fragment)) = rest.split_once('#') {
        rest = before;
    }

    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    parts.path = path;
    parts.query = query;
    parts
}

fn has_leftover_token(segment: &str) -> bool {
    segment.contains(CAPTURE_ALL)
        || segment.contains("$args")
        || segment.contains("$is_args")
        || POSITIONAL_PARAM.is_match(segment)
}

/// Decomposes a location path, rewrite regex or redirect target.
///
/// ```
/// use redirector_core::decompose;
///
/// let parsed = decompose("https://new.example.test/docs/$1$is_args$args").unwrap();
/// assert_eq!(parsed.uri, "https://new.example.test/docs/");
/// assert!(parsed.append_subpath && parsed.pass_query_string);
/// ```
pub fn decompose(raw: &str) -> Result<DecomposedUri, ParseError> {
    if raw.ends_with('$') && !raw.starts_with('^') {
        return Err(ParseError::new(format!(
            "URI \"{raw}\" ends with '$' but does not start with '^'"
        )));
    }

    let parts = split_uri(raw.trim_matches(|c: char| c == '^' || c == '$'));
    if parts.host == "$host" {
        return Err(ParseError::new("$host is not allowed in URI"));
    }

    let reassembled = format!("{}?{}", parts.path, parts.query).replace("(/.*)", "/(.*)");
    let segments: Vec<&str> = reassembled.split('/').collect();
    let Some((last, leading)) = segments.split_last() else {
        return Err(ParseError::new(format!("URI \"{raw}\" has no path")));
    };

    if let Some(segment) = leading
        .iter()
        .find(|s| s.contains(CAPTURE_ALL) || POSITIONAL_PARAM.is_match(s))
    {
        return Err(ParseError::new(format!(
            "Unsupported dynamic segment \"{segment}\" in URI \"{raw}\""
        )));
    }

    let mut result = DecomposedUri::default();
    let mut last: &str = last.strip_suffix('?').unwrap_or(*last);
    for (suffix, append, match_all, pass_query) in SUFFIXES {
        if let Some(stripped) = last.strip_suffix(suffix) {
            last = stripped;
            result.append_subpath = append;
            result.match_subpaths = match_all;
            result.pass_query_string = pass_query;
            break;
        }
    }

    if has_leftover_token(last) {
        return Err(ParseError::new(format!(
            "Unsupported token in final segment \"{last}\" of URI \"{raw}\""
        )));
    }

    let mut path = leading.join("/");
    if !leading.is_empty() {
        path.push('/');
    }
    path.push_str(last);
    if path.ends_with('?') {
        path.pop();
    }

    let has_host = !parts.host.is_empty();
    if !path.starts_with('/') && !(has_host && path.is_empty()) {
        path.insert(0, '/');
    }

    result.uri = match (has_host, parts.scheme.is_empty()) {
        (true, false) => format!("{}://{}{}", parts.scheme, parts.host, path),
        (true, true) => format!("//{}{}", parts.host, path),
        (false, _) => path,
    };

    Ok(result)
}
