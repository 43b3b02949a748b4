//! Domain and redirect rule models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::destination::{PERMANENT_STATUS, TEMPORARY_STATUS};
use crate::normalize::{normalize_hostname, normalize_path};

// =============================================================================
// Domains
// =============================================================================

/// A logical site answering for one or more hostnames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Unique identifier.
    pub id: i64,
    /// Unique human-facing name.
    pub display_name: String,
    /// Hostnames routed to this domain, lowercased.
    pub names: Vec<String>,
    /// Free-text notes.
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// Returns true if this domain answers for the given (normalized) hostname.
    pub fn has_name(&self, hostname: &str) -> bool {
        self.names.iter().any(|name| name == hostname)
    }
}

/// Data for creating a new domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDomain {
    pub display_name: String,
    pub names: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl NewDomain {
    /// Creates a new domain with the given display name and hostnames.
    pub fn new<I, S>(display_name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            display_name: display_name.into(),
            names: names.into_iter().map(|n| n.as_ref().to_string()).collect(),
            notes: String::new(),
        }
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Returns the hostnames normalized for storage, without duplicates.
    pub fn normalized_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.names.len());
        for name in self.names.iter().map(|n| normalize_hostname(n)) {
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

// =============================================================================
// Redirect Rules
// =============================================================================

/// A stored redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    /// Unique identifier.
    pub id: i64,
    /// Owning domain.
    pub domain_id: i64,
    /// Normalized request path (no surrounding slashes, root is empty).
    pub path: String,
    /// Redirect target.
    pub destination: String,
    /// 301 when set, 302 otherwise.
    pub permanent: bool,
    /// Compare `path` case-sensitively.
    pub case_sensitive: bool,
    /// Also match any path nested below `path`.
    pub match_subpaths: bool,
    /// Append the part of the request path beyond `path` to the destination.
    pub append_subpath: bool,
    /// Forward the incoming query string.
    pub pass_query_string: bool,
    /// Free-text notes.
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedirectRule {
    /// HTTP status used when this rule fires.
    pub fn status_code(&self) -> u16 {
        if self.permanent {
            PERMANENT_STATUS
        } else {
            TEMPORARY_STATUS
        }
    }

    /// Returns the writable fields of this rule.
    pub fn to_new_rule(&self) -> NewRedirectRule {
        NewRedirectRule {
            path: self.path.clone(),
            destination: self.destination.clone(),
            permanent: self.permanent,
            case_sensitive: self.case_sensitive,
            match_subpaths: self.match_subpaths,
            append_subpath: self.append_subpath,
            pass_query_string: self.pass_query_string,
            notes: self.notes.clone(),
        }
    }
}

/// Data for creating or replacing a redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRedirectRule {
    pub path: String,
    pub destination: String,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub match_subpaths: bool,
    #[serde(default)]
    pub append_subpath: bool,
    #[serde(default)]
    pub pass_query_string: bool,
    #[serde(default)]
    pub notes: String,
}

impl NewRedirectRule {
    /// Creates a rule with every flag off.
    pub fn new(path: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            destination: destination.into(),
            permanent: false,
            case_sensitive: false,
            match_subpaths: false,
            append_subpath: false,
            pass_query_string: false,
            notes: String::new(),
        }
    }

    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_match_subpaths(mut self, match_subpaths: bool) -> Self {
        self.match_subpaths = match_subpaths;
        self
    }

    pub fn with_append_subpath(mut self, append_subpath: bool) -> Self {
        self.append_subpath = append_subpath;
        self
    }

    pub fn with_pass_query_string(mut self, pass_query_string: bool) -> Self {
        self.pass_query_string = pass_query_string;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Returns a copy with the path and destination in stored form.
    pub fn normalized(mut self) -> Self {
        self.path = normalize_path(&self.path).to_string();
        self.destination = self.destination.trim().to_string();
        self
    }
}

/// Interchange shape of a rule, as produced by the legacy translator and
/// consumed by the importer. Omitted flags default to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub path: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_subpaths: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_subpath: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_query_string: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RuleRecord {
    /// Converts into a writable rule, applying defaults for omitted fields.
    pub fn to_new_rule(&self) -> NewRedirectRule {
        NewRedirectRule {
            path: self.path.clone(),
            destination: self.destination.clone(),
            permanent: self.permanent.unwrap_or(false),
            case_sensitive: self.case_sensitive.unwrap_or(false),
            match_subpaths: self.match_subpaths.unwrap_or(false),
            append_subpath: self.append_subpath.unwrap_or(false),
            pass_query_string: self.pass_query_string.unwrap_or(false),
            notes: self.notes.clone().unwrap_or_default(),
        }
    }
}

impl From<&NewRedirectRule> for RuleRecord {
    fn from(rule: &NewRedirectRule) -> Self {
        Self {
            path: rule.path.clone(),
            destination: rule.destination.clone(),
            permanent: Some(rule.permanent),
            case_sensitive: Some(rule.case_sensitive),
            match_subpaths: Some(rule.match_subpaths),
            append_subpath: Some(rule.append_subpath),
            pass_query_string: Some(rule.pass_query_string),
            notes: (!rule.notes.is_empty()).then(|| rule.notes.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_record_defaults() {
        let record: RuleRecord =
            serde_json::from_str(r#"{"path": "/old", "destination": "https://example.test"}"#)
                .unwrap();
        let rule = record.to_new_rule();

        assert_eq!(rule.path, "/old");
        assert!(!rule.permanent);
        assert!(!rule.case_sensitive);
        assert!(!rule.match_subpaths);
        assert!(rule.notes.is_empty());
    }

    #[test]
    fn test_rule_record_skips_unset_fields() {
        let record = RuleRecord {
            path: "a".into(),
            destination: "https://b.test".into(),
            permanent: Some(true),
            case_sensitive: None,
            match_subpaths: None,
            append_subpath: None,
            pass_query_string: None,
            notes: None,
        };
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["permanent"], true);
        assert!(json.get("case_sensitive").is_none());
    }

    #[test]
    fn test_new_rule_normalized() {
        let rule = NewRedirectRule::new("  /foo/bar/ ", " https://x.test/ ").normalized();
        assert_eq!(rule.path, "foo/bar");
        assert_eq!(rule.destination, "https://x.test/");
    }

    #[test]
    fn test_normalized_names_dedupes() {
        let domain = NewDomain::new("site", ["Example.test", "example.test.", "www.example.test"]);
        assert_eq!(
            domain.normalized_names(),
            vec!["example.test".to_string(), "www.example.test".to_string()]
        );
    }
}
