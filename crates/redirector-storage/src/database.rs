//! High-level database interface.

use std::path::PathBuf;

use directories::ProjectDirs;
use redirector_core::conflict::validate_rule;
use redirector_core::normalize::normalize_path;
use redirector_core::{Domain, NewDomain, NewRedirectRule, RedirectRule, RuleRecord, RuleStore};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::pool::ConnectionPool;
use crate::repository::{DomainsRepo, RulesRepo};

/// High-level database interface for Redirector.
///
/// Every write that touches rules runs validation and the write inside one
/// `BEGIN IMMEDIATE` transaction.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "redirector", "redirector")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("redirector.db"))
    }

    pub(crate) fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // === Domains ===

    /// Create a domain together with its hostnames.
    pub fn create_domain(&self, domain: NewDomain) -> Result<Domain> {
        let created = self
            .pool
            .immediate(|conn| Self::insert_domain(conn, &domain))?;

        info!(domain = %created.display_name, names = ?created.names, "Created domain");
        Ok(created)
    }

    /// Get a domain by ID.
    pub fn get_domain(&self, id: i64) -> Result<Option<Domain>> {
        let conn = self.pool.get()?;
        DomainsRepo::get_by_id(&conn, id)
    }

    /// Get all domains.
    pub fn list_domains(&self) -> Result<Vec<Domain>> {
        let conn = self.pool.get()?;
        DomainsRepo::get_all(&conn)
    }

    /// Delete a domain with its names and rules.
    pub fn delete_domain(&self, id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        let rules = RulesRepo::count_for_domain(&conn, id)?;
        DomainsRepo::delete(&conn, id)?;
        info!(id, rules, "Deleted domain");
        Ok(())
    }

    /// Number of domains.
    pub fn domain_count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        DomainsRepo::count(&conn)
    }

    // === Rules ===

    /// Get a rule by ID.
    pub fn get_rule(&self, id: i64) -> Result<Option<RedirectRule>> {
        let conn = self.pool.get()?;
        RulesRepo::get_by_id(&conn, id)
    }

    /// Get all rules of a domain, ordered by id.
    pub fn list_rules(&self, domain_id: i64) -> Result<Vec<RedirectRule>> {
        let conn = self.pool.get()?;
        Self::require_domain(&conn, domain_id)?;
        RulesRepo::get_for_domain(&conn, domain_id)
    }

    /// Delete a rule.
    pub fn delete_rule(&self, id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        RulesRepo::delete(&conn, id)?;
        debug!(id, "Deleted rule");
        Ok(())
    }

    /// Check whether a rule record could be created in a domain, without
    /// writing anything.
    pub fn validate_new_rule(&self, domain_id: i64, record: &RuleRecord) -> Result<()> {
        let conn = self.pool.get()?;
        Self::require_domain(&conn, domain_id)?;

        let rule = record.to_new_rule().normalized();
        let existing = RulesRepo::get_for_domain(&conn, domain_id)?;
        validate_rule(&rule, None, &existing)?;
        Ok(())
    }

    // === Transaction bodies ===

    /// Validates and inserts a domain with its names on an open connection.
    pub(crate) fn insert_domain(conn: &Connection, domain: &NewDomain) -> Result<Domain> {
        let names = domain.normalized_names();
        if names.is_empty() {
            return Err(StorageError::EmptyDomainNames);
        }
        if DomainsRepo::display_name_exists(conn, &domain.display_name)? {
            return Err(StorageError::DuplicateDisplayName(
                domain.display_name.clone(),
            ));
        }
        if let Some(taken) = DomainsRepo::first_taken_name(conn, &names)? {
            return Err(StorageError::DuplicateDomainName(taken));
        }

        let id = DomainsRepo::insert(conn, &domain.display_name, &domain.notes)?;
        for name in &names {
            DomainsRepo::add_name(conn, id, name)?;
        }

        DomainsRepo::get_by_id(conn, id)?
            .ok_or_else(|| StorageError::NotFound(format!("Domain with id {}", id)))
    }

    /// Validates and inserts a rule on an open connection.
    pub(crate) fn insert_rule(
        conn: &Connection,
        domain_id: i64,
        rule: NewRedirectRule,
    ) -> Result<RedirectRule> {
        let rule = rule.normalized();
        Self::require_domain(conn, domain_id)?;

        let existing = RulesRepo::get_for_domain(conn, domain_id)?;
        validate_rule(&rule, None, &existing)?;

        let id = RulesRepo::insert(conn, domain_id, &rule)?;
        RulesRepo::get_by_id(conn, id)?
            .ok_or_else(|| StorageError::NotFound(format!("Rule with id {}", id)))
    }

    fn require_domain(conn: &Connection, domain_id: i64) -> Result<()> {
        if DomainsRepo::get_by_id(conn, domain_id)?.is_none() {
            return Err(StorageError::NotFound(format!(
                "Domain with id {}",
                domain_id
            )));
        }
        Ok(())
    }
}

impl RuleStore for Database {
    type Error = StorageError;

    fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>> {
        let conn = self.pool.get()?;
        DomainsRepo::get_by_name(&conn, hostname)
    }

    fn find_by_domain_and_exact_path(
        &self,
        domain_id: i64,
        path: &str,
        case_sensitive: bool,
    ) -> Result<Option<RedirectRule>> {
        let conn = self.pool.get()?;
        RulesRepo::find_exact(&conn, domain_id, normalize_path(path), case_sensitive)
    }

    fn list_wildcards_for_domain(&self, domain_id: i64) -> Result<Vec<RedirectRule>> {
        let conn = self.pool.get()?;
        RulesRepo::get_wildcards(&conn, domain_id)
    }

    fn create_rule(&self, domain_id: i64, rule: NewRedirectRule) -> Result<RedirectRule> {
        let created = self
            .pool
            .immediate(|conn| Self::insert_rule(conn, domain_id, rule))?;

        debug!(id = created.id, path = %created.path, "Created rule");
        Ok(created)
    }

    fn update_rule(&self, rule_id: i64, rule: NewRedirectRule) -> Result<RedirectRule> {
        let rule = rule.normalized();

        let updated = self.pool.immediate(|conn| {
            let current = RulesRepo::get_by_id(conn, rule_id)?
                .ok_or_else(|| StorageError::NotFound(format!("Rule with id {}", rule_id)))?;

            let existing = RulesRepo::get_for_domain(conn, current.domain_id)?;
            validate_rule(&rule, Some(rule_id), &existing)?;

            RulesRepo::update(conn, rule_id, &rule)?;
            RulesRepo::get_by_id(conn, rule_id)?
                .ok_or_else(|| StorageError::NotFound(format!("Rule with id {}", rule_id)))
        })?;

        debug!(id = rule_id, path = %updated.path, "Updated rule");
        Ok(updated)
    }
}
