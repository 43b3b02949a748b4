//! Rule storage seam used by the resolver.

mod memory;

pub use memory::MemoryRuleStore;

use crate::models::{Domain, NewRedirectRule, RedirectRule};

/// Keyed storage of redirect rules.
///
/// Implementations enforce the invariants in [`crate::conflict`] on every
/// write and never leave a partial write behind. Reads are expected to be
/// safe to call concurrently.
pub trait RuleStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Looks up the domain owning a hostname (already lowercased, no port).
    fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>, Self::Error>;

    /// Finds the rule whose path equals `path`, restricted to rules with the
    /// given case sensitivity. Case-insensitive lookups fold case.
    fn find_by_domain_and_exact_path(
        &self,
        domain_id: i64,
        path: &str,
        case_sensitive: bool,
    ) -> Result<Option<RedirectRule>, Self::Error>;

    /// Returns the `match_subpaths` rules of a domain, ordered by id.
    fn list_wildcards_for_domain(&self, domain_id: i64) -> Result<Vec<RedirectRule>, Self::Error>;

    /// Validates and inserts a rule.
    fn create_rule(&self, domain_id: i64, rule: NewRedirectRule)
        -> Result<RedirectRule, Self::Error>;

    /// Validates and replaces a rule's fields, keeping its id and domain.
    fn update_rule(&self, rule_id: i64, rule: NewRedirectRule) -> Result<RedirectRule, Self::Error>;
}
