//! Redirector Core - rule resolution, conflict checking and config translation.
//!
//! This crate holds the pure logic of the redirect service:
//!
//! - [`uri`]: decomposes constrained nginx-style URIs into a path plus flags
//! - [`conflict`]: write-time invariants for rules sharing a domain
//! - [`resolver`]: exact-then-wildcard rule selection for a host and path
//! - [`destination`]: final `Location` computation for a matched rule
//! - [`legacy`]: translation of nginx `server` blocks into rule records
//! - [`store`]: the [`RuleStore`] seam plus an in-memory implementation
//!
//! # Example
//!
//! ```
//! use redirector_core::{MemoryRuleStore, NewDomain, NewRedirectRule, RedirectOutcome, Resolver, RuleStore};
//!
//! let store = MemoryRuleStore::new();
//! let domain = store.create_domain(NewDomain::new("example", ["example.test"])).unwrap();
//! store
//!     .create_rule(domain.id, NewRedirectRule::new("/docs", "https://docs.example.test/").with_match_subpaths(true))
//!     .unwrap();
//!
//! let outcome = Resolver::new(&store).resolve("example.test", "/docs/intro", None).unwrap();
//! assert!(matches!(outcome, RedirectOutcome::Found(_)));
//! ```

pub mod conflict;
pub mod destination;
pub mod error;
pub mod legacy;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod store;
pub mod uri;

pub use conflict::{check_conflicts, validate_rule};
pub use destination::{build_destination, Redirect};
pub use error::{
    ConflictError, DestinationError, LegacyConfigError, ParseError, StoreError, ValidationError,
};
pub use legacy::{translate_legacy_config, ServerTranslation, TranslationWarning};
pub use models::{Domain, NewDomain, NewRedirectRule, RedirectRule, RuleRecord};
pub use resolver::{RedirectOutcome, ResolveError, Resolver};
pub use store::{MemoryRuleStore, RuleStore};
pub use uri::{decompose, DecomposedUri};
