//! Rule resolution for incoming requests.
//!
//! Precedence, first hit wins:
//!
//! 1. case-sensitive rule whose path equals the request path
//! 2. case-insensitive rule whose path equals it ignoring case
//! 3. wildcard rule whose path is a segment-aligned prefix of it
//!
//! Wildcards never overlap within a domain, so step 3 yields at most one
//! candidate; they are still scanned in id order for determinism.

use thiserror::Error;
use tracing::debug;

use crate::destination::{build_destination, Redirect};
use crate::error::DestinationError;
use crate::models::RedirectRule;
use crate::normalize::{host_without_port, is_path_prefix, normalize_hostname, normalize_path};
use crate::store::RuleStore;

/// Outcome of resolving a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// A rule matched.
    Found(Redirect),
    /// No domain answers for the host.
    DomainNotFound,
    /// The domain exists but no rule matches the path.
    RuleNotFound,
}

/// Errors raised while resolving.
#[derive(Debug, Error)]
pub enum ResolveError<E: std::error::Error + 'static> {
    #[error("rule store error: {0}")]
    Store(#[source] E),

    #[error(transparent)]
    Destination(#[from] DestinationError),
}

/// Resolves requests against a [`RuleStore`].
pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RuleStore + ?Sized> Resolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Finds the rule answering for `request_path` within a domain.
    pub fn find_rule(
        &self,
        domain_id: i64,
        request_path: &str,
    ) -> Result<Option<RedirectRule>, S::Error> {
        let path = normalize_path(request_path);

        for case_sensitive in [true, false] {
            if let Some(rule) =
                self.store
                    .find_by_domain_and_exact_path(domain_id, path, case_sensitive)?
            {
                debug!(path, rule_id = rule.id, case_sensitive, "Exact rule match");
                return Ok(Some(rule));
            }
        }

        let mut wildcards = self.store.list_wildcards_for_domain(domain_id)?;
        wildcards.sort_by_key(|rule| rule.id);

        let matched = wildcards
            .into_iter()
            .find(|rule| is_path_prefix(&rule.path, path, !rule.case_sensitive));
        if let Some(rule) = &matched {
            debug!(path, rule_id = rule.id, "Wildcard rule match");
        }

        Ok(matched)
    }

    /// Resolves a request to a redirect.
    ///
    /// `host` is the raw `Host` header value (a port suffix is ignored);
    /// `query` is the raw query string without the leading `?`.
    pub fn resolve(
        &self,
        host: &str,
        request_path: &str,
        query: Option<&str>,
    ) -> Result<RedirectOutcome, ResolveError<S::Error>> {
        let hostname = normalize_hostname(host_without_port(host));

        let Some(domain) = self
            .store
            .find_domain_by_hostname(&hostname)
            .map_err(ResolveError::Store)?
        else {
            debug!(host = %hostname, "No domain for host");
            return Ok(RedirectOutcome::DomainNotFound);
        };

        let Some(rule) = self
            .find_rule(domain.id, request_path)
            .map_err(ResolveError::Store)?
        else {
            debug!(host = %hostname, path = request_path, "No rule for path");
            return Ok(RedirectOutcome::RuleNotFound);
        };

        let redirect = build_destination(&rule, request_path, query)?;
        Ok(RedirectOutcome::Found(redirect))
    }
}
