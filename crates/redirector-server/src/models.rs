//! API request and response models.
//!
//! Domains and rules are returned as the core [`redirector_core::Domain`]
//! and [`redirector_core::RedirectRule`] types; rule writes take a
//! [`redirector_core::NewRedirectRule`] body.

use redirector_core::NewDomain;
use serde::{Deserialize, Serialize};

/// Response body for GET /__readiness.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub package_version: String,
    pub commit_hash: String,
    /// UTC, `YYYY-MM-DDTHH:MM:SS.000Z`.
    pub build_time: String,
}

/// Request body for POST /api/domains.
#[derive(Debug, Deserialize)]
pub struct CreateDomainRequest {
    /// Defaults to the first name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Hostnames routed to the domain.
    pub names: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl CreateDomainRequest {
    /// Converts into a [`NewDomain`], or `None` without any name.
    pub fn into_new_domain(self) -> Option<NewDomain> {
        let display_name = self
            .display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.names.first().cloned())?;

        Some(NewDomain::new(display_name, &self.names).with_notes(self.notes))
    }
}

/// Response body for POST /api/domains/{id}/rules/validate.
#[derive(Debug, Serialize)]
pub struct ValidateRuleResponse {
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_defaults_to_first_name() {
        let req: CreateDomainRequest =
            serde_json::from_str(r#"{"names": ["a.test", "b.test"]}"#).unwrap();
        let domain = req.into_new_domain().unwrap();
        assert_eq!(domain.display_name, "a.test");
        assert_eq!(domain.names.len(), 2);

        let req: CreateDomainRequest = serde_json::from_str(r#"{"names": []}"#).unwrap();
        assert!(req.into_new_domain().is_none());
    }

    #[test]
    fn test_readiness_uses_camel_case() {
        let json = serde_json::to_value(ReadinessResponse {
            status: "ok",
            package_version: "0.1.0".into(),
            commit_hash: "abc".into(),
            build_time: "2024-01-01T00:00:00.000Z".into(),
        })
        .unwrap();
        assert_eq!(json["packageVersion"], "0.1.0");
        assert_eq!(json["commitHash"], "abc");
        assert!(json.get("buildTime").is_some());
    }
}
