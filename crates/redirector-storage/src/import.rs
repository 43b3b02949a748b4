//! Batch import of domains and rules.
//!
//! The whole batch runs in one transaction. Without `force` the first
//! rejected domain or rule aborts the import and nothing is written; with
//! `force` rejections are collected in the report and skipped. A dry run
//! validates everything and rolls back at the end.

use std::path::Path;

use chrono::{DateTime, Utc};
use redirector_core::normalize::normalize_path;
use redirector_core::{Domain, NewDomain, RuleRecord};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::StorageError;
use crate::repository::RulesRepo;

/// One domain with its rules, as found in an import file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportItem {
    /// Defaults to the first domain name.
    #[serde(default)]
    pub display_name: Option<String>,
    pub domain_names: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
}

/// Accepted file layouts: a bare item list, or a translation report.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Items(Vec<ImportItem>),
    Report { results: Vec<ImportItem> },
}

/// Parse an import document.
pub fn parse_import(json: &str) -> Result<Vec<ImportItem>, ImportError> {
    let items = match serde_json::from_str(json)? {
        ImportDocument::Items(items) => items,
        ImportDocument::Report { results } => results,
    };
    Ok(items)
}

/// Import errors.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid import file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A domain or rule was rejected and `force` was not set.
    #[error("Import aborted, all changes rolled back: {0}")]
    Aborted(String),
}

/// Import behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Validate everything, then roll back.
    pub dry_run: bool,
    /// Skip rejected domains and rules instead of aborting.
    pub force: bool,
}

/// Counters for one kind of imported object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

impl ImportStats {
    /// Objects never attempted, e.g. rules of a rejected domain.
    pub fn skipped(&self) -> usize {
        self.total.saturating_sub(self.successful + self.failed)
    }
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub domains: ImportStats,
    pub rules: ImportStats,
    /// Rejection messages collected in `force` mode.
    pub errors: Vec<String>,
    pub dry_run: bool,
}

/// Imports [`ImportItem`]s into a [`Database`].
pub struct Importer<'a> {
    db: &'a Database,
    options: ImportOptions,
    started_at: DateTime<Utc>,
}

impl<'a> Importer<'a> {
    pub fn new(db: &'a Database, options: ImportOptions) -> Self {
        Self {
            db,
            options,
            started_at: Utc::now(),
        }
    }

    /// Read, parse and import a JSON file.
    pub fn import_file(&self, path: &Path) -> Result<ImportReport, ImportError> {
        let content = std::fs::read_to_string(path)?;
        let items = parse_import(&content)?;
        self.import(&items)
    }

    /// Import a batch of items.
    pub fn import(&self, items: &[ImportItem]) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport {
            dry_run: self.options.dry_run,
            ..ImportReport::default()
        };
        report.domains.total = items.len();
        report.rules.total = items.iter().map(|item| item.rules.len()).sum();

        info!(
            domains = report.domains.total,
            rules = report.rules.total,
            dry_run = self.options.dry_run,
            force = self.options.force,
            "Starting import"
        );

        let mut conn = self.db.pool().get()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        for (index, item) in items.iter().enumerate() {
            debug!("Processing item #{}", index + 1);
            self.import_item(&tx, item, index, &mut report)?;
        }

        if self.options.dry_run {
            tx.rollback().map_err(StorageError::from)?;
            info!("Dry run finished, changes rolled back");
        } else {
            tx.commit().map_err(StorageError::from)?;
            info!(
                domains = report.domains.successful,
                rules = report.rules.successful,
                "Import finished"
            );
        }

        Ok(report)
    }

    fn import_item(
        &self,
        conn: &Connection,
        item: &ImportItem,
        index: usize,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let display_name = item
            .display_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| item.domain_names.first().cloned());
        let Some(display_name) = display_name else {
            return self.reject_domain(
                report,
                format!("No domain names provided for item at index {}", index),
            );
        };

        let new_domain = NewDomain::new(display_name, &item.domain_names)
            .with_notes(self.stamp(item.notes.as_deref().unwrap_or_default()));

        let domain = match Database::insert_domain(conn, &new_domain) {
            Ok(domain) => domain,
            Err(err) if is_rejection(&err) => {
                return self.reject_domain(report, format!("Item at index {}: {}", index, err));
            }
            Err(err) => return Err(err.into()),
        };

        info!("Created domain {}", domain.display_name);
        report.domains.successful += 1;

        for record in &item.rules {
            self.import_rule(conn, &domain, record, report)?;
        }
        Ok(())
    }

    fn import_rule(
        &self,
        conn: &Connection,
        domain: &Domain,
        record: &RuleRecord,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let rule = record.to_new_rule();

        if RulesRepo::path_exists(conn, domain.id, normalize_path(&rule.path))? {
            return self.reject_rule(
                report,
                format!(
                    "Rule for {} already exists for domain {}",
                    record.path, domain.display_name
                ),
            );
        }

        let notes = self.stamp(&rule.notes);
        match Database::insert_rule(conn, domain.id, rule.with_notes(notes)) {
            Ok(created) => {
                let shown = if created.path.is_empty() { "/" } else { created.path.as_str() };
                debug!("Created rule {} -> {}", shown, created.destination);
                report.rules.successful += 1;
                Ok(())
            }
            Err(err) if is_rejection(&err) => self.reject_rule(
                report,
                format!(
                    "Rule for {} rejected for domain {}: {}",
                    record.path, domain.display_name, err
                ),
            ),
            Err(err) => Err(err.into()),
        }
    }

    fn reject_domain(&self, report: &mut ImportReport, message: String) -> Result<(), ImportError> {
        self.record_failure(report, message)?;
        report.domains.failed += 1;
        Ok(())
    }

    fn reject_rule(&self, report: &mut ImportReport, message: String) -> Result<(), ImportError> {
        self.record_failure(report, message)?;
        report.rules.failed += 1;
        Ok(())
    }

    fn record_failure(&self, report: &mut ImportReport, message: String) -> Result<(), ImportError> {
        warn!("{}", message);
        if !self.options.force {
            return Err(ImportError::Aborted(message));
        }
        report.errors.push(message);
        Ok(())
    }

    fn stamp(&self, notes: &str) -> String {
        format!("Generated by import command on {}\n{}", self.started_at, notes)
    }
}

/// Errors caused by the imported data, as opposed to the database itself.
fn is_rejection(err: &StorageError) -> bool {
    matches!(
        err,
        StorageError::Validation(_)
            | StorageError::DuplicateDomainName(_)
            | StorageError::DuplicateDisplayName(_)
            | StorageError::EmptyDomainNames
    )
}
