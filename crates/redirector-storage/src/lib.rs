//! Redirector Storage - SQLite persistence layer.
//!
//! This crate stores domains, their hostnames and their redirect rules.
//! [`Database`] implements [`redirector_core::RuleStore`], so the resolver
//! runs on it directly, and every rule write is validated inside a
//! `BEGIN IMMEDIATE` transaction.
//!
//! # Example
//!
//! ```no_run
//! use redirector_core::{NewDomain, NewRedirectRule, RuleStore};
//! use redirector_storage::Database;
//!
//! let db = Database::in_memory().unwrap();
//! let domain = db.create_domain(NewDomain::new("example", ["example.test"])).unwrap();
//! db.create_rule(domain.id, NewRedirectRule::new("/old", "https://example.test/new"))
//!     .unwrap();
//! ```

mod database;
pub mod error;
pub mod import;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use import::{parse_import, ImportError, ImportItem, ImportOptions, ImportReport, ImportStats, Importer};
pub use pool::ConnectionPool;
