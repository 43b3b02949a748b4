//! Core error types.

use thiserror::Error;

/// A constrained URI could not be decomposed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    /// Creates a parse error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A rule write would break one of the per-domain invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// Another rule already answers for the same path.
    #[error("path \"{path}\" conflicts with existing rule \"{existing}\"")]
    DuplicatePath { path: String, existing: String },

    /// Two subpath-matching rules would overlap.
    #[error("wildcard path \"{path}\" overlaps existing wildcard rule \"{existing}\"")]
    NestedWildcard { path: String, existing: String },
}

impl ConflictError {
    /// Path of the existing rule that caused the conflict.
    pub fn existing_path(&self) -> &str {
        match self {
            ConflictError::DuplicatePath { existing, .. }
            | ConflictError::NestedWildcard { existing, .. } => existing,
        }
    }
}

/// A rule failed write-time validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Destination is neither an absolute URL nor a site-relative path.
    #[error("invalid destination \"{0}\": expected an absolute URL or a path starting with '/'")]
    InvalidDestination(String),
}

/// The destination of a matched rule could not be combined with the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot join \"{residual}\" onto \"{destination}\": {source}")]
pub struct DestinationError {
    pub destination: String,
    pub residual: String,
    #[source]
    pub source: url::ParseError,
}

/// Errors from [`crate::store::MemoryRuleStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Domain id does not exist.
    #[error("domain {0} not found")]
    DomainNotFound(i64),

    /// Rule id does not exist.
    #[error("rule {0} not found")]
    RuleNotFound(i64),

    /// A hostname is already claimed by another domain.
    #[error("domain name \"{0}\" is already in use")]
    DuplicateDomainName(String),

    /// Display names are unique across domains.
    #[error("display name \"{0}\" is already in use")]
    DuplicateDisplayName(String),

    /// A domain must own at least one hostname.
    #[error("a domain needs at least one domain name")]
    EmptyDomainNames,

    /// The store lock was poisoned by a panicking writer.
    #[error("rule store lock poisoned")]
    LockPoisoned,
}

/// Legacy configuration input could not be read into a directive tree.
#[derive(Debug, Error)]
pub enum LegacyConfigError {
    /// A token appeared where the grammar does not allow it.
    #[error("line {line}: unexpected \"{token}\"")]
    UnexpectedToken { token: String, line: usize },

    /// Input ended inside a directive or block.
    #[error("unexpected end of file, expecting \"{expected}\"")]
    UnexpectedEof { expected: &'static str },

    /// A quoted string was never closed.
    #[error("line {line}: unterminated quoted string")]
    UnterminatedQuote { line: usize },

    /// Input file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ConfigMap wrapper is not valid YAML.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Crossplane payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// ConfigMap lacks the `data."server.conf"` entry.
    #[error("ConfigMap has no data.\"server.conf\" entry")]
    MissingServerConf,
}
