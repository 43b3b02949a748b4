//! Final redirect target computation.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use url::{Position, Url};

use crate::error::DestinationError;
use crate::models::RedirectRule;
use crate::normalize::{normalize_path, strip_path_prefix};

/// Status for permanent redirects.
pub const PERMANENT_STATUS: u16 = 301;

/// Status for temporary redirects.
pub const TEMPORARY_STATUS: u16 = 302;

/// Base used to resolve site-relative destinations; stripped again afterwards.
const PLACEHOLDER_ORIGIN: &str = "http://placeholder.invalid";

/// Bytes escaped in a decoded residual before it is joined as a path.
const SUBPATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A computed redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    /// Value of the `Location` header.
    pub location: String,
    /// 301 or 302.
    pub status: u16,
}

impl Redirect {
    pub fn is_permanent(&self) -> bool {
        self.status == PERMANENT_STATUS
    }
}

/// Computes the redirect for a matched rule.
///
/// `request_path` is the raw request path; `query` is the raw query string
/// without the leading `?`.
pub fn build_destination(
    rule: &RedirectRule,
    request_path: &str,
    query: Option<&str>,
) -> Result<Redirect, DestinationError> {
    let mut location = rule.destination.clone();

    if rule.match_subpaths && rule.append_subpath {
        let residual = subpath_residual(rule, normalize_path(request_path));
        location = join_subpath(&location, residual)?;
    }

    if rule.pass_query_string {
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            location = append_query(location, query);
        }
    }

    Ok(Redirect {
        location,
        status: rule.status_code(),
    })
}

/// Part of the normalized request path below the rule's path, without the
/// separating slashes.
fn subpath_residual<'a>(rule: &RedirectRule, path: &'a str) -> &'a str {
    strip_path_prefix(path, &rule.path, !rule.case_sensitive)
        .unwrap_or_default()
        .trim_start_matches('/')
}

/// Resolves `residual` against `destination` as a relative reference.
fn join_subpath(destination: &str, residual: &str) -> Result<String, DestinationError> {
    if residual.is_empty() {
        return Ok(destination.to_string());
    }

    let encoded = utf8_percent_encode(residual, SUBPATH_ESCAPES).to_string();

    // A colon in the first segment would otherwise be read as a scheme.
    let reference = match encoded.split('/').next() {
        Some(first) if first.contains(':') => format!("./{encoded}"),
        _ => encoded.clone(),
    };

    let error = |source| DestinationError {
        destination: destination.to_string(),
        residual: residual.to_string(),
        source,
    };

    match Url::parse(destination) {
        Ok(base) => Ok(base.join(&reference).map_err(error)?.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = Url::parse(PLACEHOLDER_ORIGIN)
                .and_then(|origin| origin.join(destination))
                .and_then(|base| base.join(&reference))
                .map_err(error)?;
            Ok(joined[Position::BeforePath..].to_string())
        }
        Err(source) => Err(error(source)),
    }
}

/// Appends a query string, merging with any query already on the destination.
fn append_query(mut location: String, query: &str) -> String {
    if !(location.ends_with('?') || location.ends_with('&')) {
        location.push(if location.contains('?') { '&' } else { '?' });
    }
    location.push_str(query);
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(path: &str, destination: &str) -> RedirectRule {
        RedirectRule {
            id: 1,
            domain_id: 1,
            path: path.to_string(),
            destination: destination.to_string(),
            permanent: false,
            case_sensitive: false,
            match_subpaths: false,
            append_subpath: false,
            pass_query_string: false,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plain_destination_and_status() {
        let mut r = rule("foo", "https://example.test/new");
        let redirect = build_destination(&r, "/foo", Some("a=1")).unwrap();
        assert_eq!(redirect.location, "https://example.test/new");
        assert_eq!(redirect.status, 302);
        assert!(!redirect.is_permanent());

        r.permanent = true;
        assert_eq!(build_destination(&r, "/foo", None).unwrap().status, 301);
    }

    #[test]
    fn test_query_passthrough() {
        let mut r = rule("foo", "https://example.test/new");
        r.pass_query_string = true;

        let redirect = build_destination(&r, "/foo", Some("a=1&b=2")).unwrap();
        assert_eq!(redirect.location, "https://example.test/new?a=1&b=2");

        let redirect = build_destination(&r, "/foo", Some("")).unwrap();
        assert_eq!(redirect.location, "https://example.test/new");

        let redirect = build_destination(&r, "/foo", None).unwrap();
        assert_eq!(redirect.location, "https://example.test/new");
    }

    #[test]
    fn test_query_merges_with_existing_query() {
        let mut r = rule("foo", "https://example.test/new?lang=fi");
        r.pass_query_string = true;

        let redirect = build_destination(&r, "/foo", Some("a=1")).unwrap();
        assert_eq!(redirect.location, "https://example.test/new?lang=fi&a=1");
    }

    #[test]
    fn test_subpath_append() {
        let mut r = rule("foo", "https://example.test/new/");
        r.match_subpaths = true;
        r.append_subpath = true;

        for (request, expected) in [
            ("/foo/", "https://example.test/new/"),
            ("/foo/bar", "https://example.test/new/bar"),
            ("/foo/bar/baz/", "https://example.test/new/bar/baz"),
        ] {
            assert_eq!(build_destination(&r, request, None).unwrap().location, expected);
        }
    }

    #[test]
    fn test_subpath_replaces_last_segment_without_trailing_slash() {
        let mut r = rule("foo", "https://x.test/bar");
        r.match_subpaths = true;
        r.append_subpath = true;

        let redirect = build_destination(&r, "/foo/bar/baz", None).unwrap();
        assert_eq!(redirect.location, "https://x.test/bar/baz");

        let redirect = build_destination(&r, "/foo/qux", None).unwrap();
        assert_eq!(redirect.location, "https://x.test/qux");
    }

    #[test]
    fn test_decoded_subpath_is_escaped() {
        let mut r = rule("vanha", "https://example.test/uusi/");
        r.match_subpaths = true;
        r.append_subpath = true;

        let redirect = build_destination(&r, "/vanha/päivä/a b", None).unwrap();
        assert_eq!(
            redirect.location,
            "https://example.test/uusi/p%C3%A4iv%C3%A4/a%20b"
        );

        let redirect = build_destination(&r, "/vanha/50%?#x", None).unwrap();
        assert_eq!(redirect.location, "https://example.test/uusi/50%25%3F%23x");
    }

    #[test]
    fn test_subpath_append_folds_case() {
        let mut r = rule("foo", "https://example.test/new/");
        r.match_subpaths = true;
        r.append_subpath = true;

        let redirect = build_destination(&r, "/FOO/Bar", None).unwrap();
        assert_eq!(redirect.location, "https://example.test/new/Bar");
    }

    #[test]
    fn test_subpath_append_without_match_subpaths_is_ignored() {
        let mut r = rule("foo", "https://example.test/new/");
        r.append_subpath = true;

        let redirect = build_destination(&r, "/foo", None).unwrap();
        assert_eq!(redirect.location, "https://example.test/new/");
    }

    #[test]
    fn test_subpath_and_query_together() {
        let mut r = rule("docs", "https://docs.example.test/");
        r.match_subpaths = true;
        r.append_subpath = true;
        r.pass_query_string = true;

        let redirect = build_destination(&r, "/docs/guide/intro", Some("v=2")).unwrap();
        assert_eq!(redirect.location, "https://docs.example.test/guide/intro?v=2");
    }

    #[test]
    fn test_site_relative_destination() {
        let mut r = rule("old", "/new/");
        r.match_subpaths = true;
        r.append_subpath = true;

        let redirect = build_destination(&r, "/old/page", None).unwrap();
        assert_eq!(redirect.location, "/new/page");
    }

    #[test]
    fn test_colon_in_subpath_is_not_a_scheme() {
        let mut r = rule("wiki", "https://example.test/wiki/");
        r.match_subpaths = true;
        r.append_subpath = true;

        let redirect = build_destination(&r, "/wiki/Help:Contents", None).unwrap();
        assert_eq!(redirect.location, "https://example.test/wiki/Help:Contents");
    }
}
