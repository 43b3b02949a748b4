//! In-memory rule store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info};

use crate::conflict::validate_rule;
use crate::error::StoreError;
use crate::models::{Domain, NewDomain, NewRedirectRule, RedirectRule};
use crate::normalize::{normalize_path, paths_equal};
use crate::store::RuleStore;

#[derive(Debug, Default)]
struct State {
    domains: Vec<Domain>,
    rules: Vec<RedirectRule>,
    last_domain_id: i64,
    last_rule_id: i64,
}

/// Rule store held entirely in memory.
///
/// Reads share a read lock. Each write holds the write lock across
/// validation and mutation, so concurrent writers to one domain cannot
/// both pass validation.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    state: RwLock<State>,
}

impl MemoryRuleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Creates a domain with its hostnames.
    pub fn create_domain(&self, domain: NewDomain) -> Result<Domain, StoreError> {
        let names = domain.normalized_names();
        if names.is_empty() {
            return Err(StoreError::EmptyDomainNames);
        }

        let mut state = self.write()?;

        if state
            .domains
            .iter()
            .any(|d| d.display_name == domain.display_name)
        {
            return Err(StoreError::DuplicateDisplayName(domain.display_name));
        }
        if let Some(taken) = names
            .iter()
            .find(|name| state.domains.iter().any(|d| d.has_name(name)))
        {
            return Err(StoreError::DuplicateDomainName(taken.clone()));
        }

        state.last_domain_id += 1;
        let now = Utc::now();
        let created = Domain {
            id: state.last_domain_id,
            display_name: domain.display_name,
            names,
            notes: domain.notes,
            created_at: now,
            updated_at: now,
        };
        state.domains.push(created.clone());

        info!(domain = %created.display_name, "Created domain");
        Ok(created)
    }

    /// Returns a rule by id.
    pub fn get_rule(&self, id: i64) -> Result<Option<RedirectRule>, StoreError> {
        Ok(self.read()?.rules.iter().find(|r| r.id == id).cloned())
    }

    /// Returns every rule of a domain, ordered by id.
    pub fn rules_for_domain(&self, domain_id: i64) -> Result<Vec<RedirectRule>, StoreError> {
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.domain_id == domain_id)
            .cloned()
            .collect())
    }

    /// Removes a rule.
    pub fn delete_rule(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);

        if state.rules.len() == before {
            return Err(StoreError::RuleNotFound(id));
        }
        Ok(())
    }
}

impl RuleStore for MemoryRuleStore {
    type Error = StoreError;

    fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>, StoreError> {
        Ok(self
            .read()?
            .domains
            .iter()
            .find(|d| d.has_name(hostname))
            .cloned())
    }

    fn find_by_domain_and_exact_path(
        &self,
        domain_id: i64,
        path: &str,
        case_sensitive: bool,
    ) -> Result<Option<RedirectRule>, StoreError> {
        let path = normalize_path(path);
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.domain_id == domain_id && r.case_sensitive == case_sensitive)
            .find(|r| paths_equal(&r.path, path, !case_sensitive))
            .cloned())
    }

    fn list_wildcards_for_domain(&self, domain_id: i64) -> Result<Vec<RedirectRule>, StoreError> {
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.domain_id == domain_id && r.match_subpaths)
            .cloned()
            .collect())
    }

    fn create_rule(
        &self,
        domain_id: i64,
        rule: NewRedirectRule,
    ) -> Result<RedirectRule, StoreError> {
        let rule = rule.normalized();
        let mut state = self.write()?;

        if !state.domains.iter().any(|d| d.id == domain_id) {
            return Err(StoreError::DomainNotFound(domain_id));
        }

        validate_rule(
            &rule,
            None,
            state.rules.iter().filter(|r| r.domain_id == domain_id),
        )?;

        state.last_rule_id += 1;
        let now = Utc::now();
        let created = RedirectRule {
            id: state.last_rule_id,
            domain_id,
            path: rule.path,
            destination: rule.destination,
            permanent: rule.permanent,
            case_sensitive: rule.case_sensitive,
            match_subpaths: rule.match_subpaths,
            append_subpath: rule.append_subpath,
            pass_query_string: rule.pass_query_string,
            notes: rule.notes,
            created_at: now,
            updated_at: now,
        };
        state.rules.push(created.clone());

        debug!(id = created.id, path = %created.path, "Created rule");
        Ok(created)
    }

    fn update_rule(&self, rule_id: i64, rule: NewRedirectRule) -> Result<RedirectRule, StoreError> {
        let rule = rule.normalized();
        let mut state = self.write()?;

        let index = state
            .rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or(StoreError::RuleNotFound(rule_id))?;
        let domain_id = state.rules[index].domain_id;

        validate_rule(
            &rule,
            Some(rule_id),
            state.rules.iter().filter(|r| r.domain_id == domain_id),
        )?;

        let stored = &mut state.rules[index];
        stored.path = rule.path;
        stored.destination = rule.destination;
        stored.permanent = rule.permanent;
        stored.case_sensitive = rule.case_sensitive;
        stored.match_subpaths = rule.match_subpaths;
        stored.append_subpath = rule.append_subpath;
        stored.pass_query_string = rule.pass_query_string;
        stored.notes = rule.notes;
        stored.updated_at = Utc::now();

        debug!(id = rule_id, path = %stored.path, "Updated rule");
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConflictError, ValidationError};

    fn store_with_domain() -> (MemoryRuleStore, i64) {
        let store = MemoryRuleStore::new();
        let domain = store
            .create_domain(NewDomain::new("example", ["Example.test", "www.example.test"]))
            .unwrap();
        (store, domain.id)
    }

    #[test]
    fn test_domain_names_are_unique() {
        let (store, _) = store_with_domain();

        let err = store
            .create_domain(NewDomain::new("other", ["example.test"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateDomainName(name) if name == "example.test"));

        let err = store
            .create_domain(NewDomain::new("example", ["fresh.test"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateDisplayName(_)));

        assert!(matches!(
            store.create_domain(NewDomain::new("empty", Vec::<String>::new())),
            Err(StoreError::EmptyDomainNames)
        ));
    }

    #[test]
    fn test_find_domain_by_hostname() {
        let (store, id) = store_with_domain();
        let domain = store.find_domain_by_hostname("example.test").unwrap().unwrap();
        assert_eq!(domain.id, id);
        assert!(store.find_domain_by_hostname("unknown.test").unwrap().is_none());
    }

    #[test]
    fn test_create_rule_normalizes_path() {
        let (store, id) = store_with_domain();
        let rule = store
            .create_rule(id, NewRedirectRule::new(" /foo/bar/ ", "https://x.test/"))
            .unwrap();
        assert_eq!(rule.path, "foo/bar");
        assert_eq!(store.get_rule(rule.id).unwrap(), Some(rule));
    }

    #[test]
    fn test_create_rule_unknown_domain() {
        let store = MemoryRuleStore::new();
        let err = store
            .create_rule(42, NewRedirectRule::new("foo", "https://x.test/"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DomainNotFound(42)));
    }

    #[test]
    fn test_conflict_leaves_store_untouched() {
        let (store, id) = store_with_domain();
        store
            .create_rule(id, NewRedirectRule::new("foo", "https://x.test/"))
            .unwrap();

        let err = store
            .create_rule(id, NewRedirectRule::new("FOO", "https://y.test/"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::Conflict(ConflictError::DuplicatePath { .. }))
        ));
        assert_eq!(store.rules_for_domain(id).unwrap().len(), 1);
    }

    #[test]
    fn test_rules_are_scoped_per_domain() {
        let (store, first) = store_with_domain();
        let second = store
            .create_domain(NewDomain::new("other", ["other.test"]))
            .unwrap()
            .id;

        store
            .create_rule(first, NewRedirectRule::new("foo", "https://x.test/"))
            .unwrap();
        assert!(store
            .create_rule(second, NewRedirectRule::new("foo", "https://x.test/"))
            .is_ok());
    }

    #[test]
    fn test_update_rule_revalidates_case_switch() {
        let (store, id) = store_with_domain();
        let lower = store
            .create_rule(
                id,
                NewRedirectRule::new("foo", "https://x.test/").with_case_sensitive(true),
            )
            .unwrap();
        store
            .create_rule(
                id,
                NewRedirectRule::new("FOO", "https://x.test/").with_case_sensitive(true),
            )
            .unwrap();

        let switched = lower.to_new_rule().with_case_sensitive(false);
        assert!(store.update_rule(lower.id, switched).is_err());
        assert!(store.get_rule(lower.id).unwrap().unwrap().case_sensitive);
    }

    #[test]
    fn test_update_wildcard_in_place() {
        let (store, id) = store_with_domain();
        let rule = store
            .create_rule(
                id,
                NewRedirectRule::new("foo", "https://x.test/").with_match_subpaths(true),
            )
            .unwrap();

        let updated = store
            .update_rule(rule.id, rule.to_new_rule().with_permanent(true))
            .unwrap();
        assert!(updated.permanent);
        assert_eq!(updated.id, rule.id);
    }

    #[test]
    fn test_exact_lookup_respects_case_mode() {
        let (store, id) = store_with_domain();
        store
            .create_rule(
                id,
                NewRedirectRule::new("Foo", "https://x.test/").with_case_sensitive(true),
            )
            .unwrap();

        assert!(store
            .find_by_domain_and_exact_path(id, "Foo", true)
            .unwrap()
            .is_some());
        assert!(store
            .find_by_domain_and_exact_path(id, "foo", true)
            .unwrap()
            .is_none());
        assert!(store
            .find_by_domain_and_exact_path(id, "foo", false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_rule() {
        let (store, id) = store_with_domain();
        let rule = store
            .create_rule(id, NewRedirectRule::new("foo", "https://x.test/"))
            .unwrap();

        store.delete_rule(rule.id).unwrap();
        assert!(matches!(
            store.delete_rule(rule.id),
            Err(StoreError::RuleNotFound(_))
        ));
    }
}
