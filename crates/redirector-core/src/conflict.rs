//! Write-time invariants for rules that share a domain.
//!
//! Two checks run on every create and update:
//!
//! 1. **Duplicate path.** Two case-sensitive rules collide only on identical
//!    paths. As soon as either side is case-insensitive, paths that are equal
//!    ignoring case collide.
//! 2. **Nested wildcards.** Among `match_subpaths` rules, no path may lie
//!    below another. Case is folded unless both rules are case-sensitive.
//!
//! A rule is never compared against itself, so updating a rule in place
//! does not trip over its previous version.

use tracing::debug;
use url::Url;

use crate::error::{ConflictError, ValidationError};
use crate::models::{NewRedirectRule, RedirectRule};
use crate::normalize::{is_nested_under, normalize_path, paths_equal};

/// Checks a candidate rule against the other rules of its domain.
///
/// `candidate_id` is the id of the rule being updated, if any; that rule is
/// skipped.
pub fn check_conflicts<'a, I>(
    candidate: &NewRedirectRule,
    candidate_id: Option<i64>,
    existing: I,
) -> Result<(), ConflictError>
where
    I: IntoIterator<Item = &'a RedirectRule>,
{
    let path = normalize_path(&candidate.path);

    for other in existing {
        if Some(other.id) == candidate_id {
            continue;
        }

        let fold_case = !(candidate.case_sensitive && other.case_sensitive);

        if paths_equal(path, &other.path, fold_case) {
            debug!(path, existing = %other.path, "Duplicate rule path");
            return Err(ConflictError::DuplicatePath {
                path: path.to_string(),
                existing: other.path.clone(),
            });
        }

        if candidate.match_subpaths
            && other.match_subpaths
            && (is_nested_under(path, &other.path, fold_case)
                || is_nested_under(&other.path, path, fold_case))
        {
            debug!(path, existing = %other.path, "Nested wildcard rule");
            return Err(ConflictError::NestedWildcard {
                path: path.to_string(),
                existing: other.path.clone(),
            });
        }
    }

    Ok(())
}

/// Returns true if the destination is an absolute URL or a site-relative path.
pub fn is_valid_destination(destination: &str) -> bool {
    let destination = destination.trim();
    if destination.is_empty() {
        return false;
    }
    destination.starts_with('/') || Url::parse(destination).is_ok()
}

/// Full write-time validation: destination shape, then conflicts.
pub fn validate_rule<'a, I>(
    candidate: &NewRedirectRule,
    candidate_id: Option<i64>,
    existing: I,
) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a RedirectRule>,
{
    if !is_valid_destination(&candidate.destination) {
        return Err(ValidationError::InvalidDestination(
            candidate.destination.clone(),
        ));
    }

    check_conflicts(candidate, candidate_id, existing)?;
    Ok(())
}
