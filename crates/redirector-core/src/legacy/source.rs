//! Input formats for legacy configuration.
//!
//! Besides plain nginx text we accept Kubernetes ConfigMaps carrying the
//! server config under `data."server.conf"`, and crossplane JSON dumps.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::LegacyConfigError;
use crate::legacy::directive::Directive;
use crate::legacy::parser::parse_config;

/// ConfigMap key holding the server config.
pub const SERVER_CONF_KEY: &str = "server.conf";

/// Placeholder templating uses for a literal `$`.
const DOLLAR_PLACEHOLDER: &str = "${DOLLAR}";

/// How an input file is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// Raw nginx config text.
    Nginx,
    /// Kubernetes ConfigMap YAML.
    ConfigMap,
    /// Crossplane JSON output.
    Crossplane,
}

impl ConfigFormat {
    /// Guesses the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => ConfigFormat::ConfigMap,
            Some("json") => ConfigFormat::Crossplane,
            _ => ConfigFormat::Nginx,
        }
    }

    /// Reads `content` into a directive tree.
    pub fn parse(self, content: &str) -> Result<Vec<Directive>, LegacyConfigError> {
        match self {
            ConfigFormat::Nginx => parse_config(content),
            ConfigFormat::ConfigMap => parse_config(&server_conf_from_configmap(content)?),
            ConfigFormat::Crossplane => directives_from_crossplane(content),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: HashMap<String, String>,
}

/// Extracts the server config from a ConfigMap and undoes `${DOLLAR}`
/// escaping.
pub fn server_conf_from_configmap(yaml: &str) -> Result<String, LegacyConfigError> {
    let config_map: ConfigMap = serde_yaml::from_str(yaml)?;
    let server_conf = config_map
        .data
        .get(SERVER_CONF_KEY)
        .ok_or(LegacyConfigError::MissingServerConf)?;

    Ok(server_conf.replace(DOLLAR_PLACEHOLDER, "$"))
}

#[derive(Debug, Deserialize)]
struct CrossplanePayload {
    config: Vec<CrossplaneFile>,
}

#[derive(Debug, Deserialize)]
struct CrossplaneFile {
    #[serde(default)]
    parsed: Vec<Directive>,
}

/// Reads the directive trees of every file in a crossplane payload.
pub fn directives_from_crossplane(json: &str) -> Result<Vec<Directive>, LegacyConfigError> {
    let payload: CrossplanePayload = serde_json::from_str(json)?;
    Ok(payload
        .config
        .into_iter()
        .flat_map(|file| file.parsed)
        .collect())
}

/// Name reported for a source file: the file name without its extension,
/// dots replaced by underscores, suffixed with `_server.conf`.
pub fn output_filename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts: Vec<&str> = name.split('.').collect();
    parts.pop();

    format!("{}_server.conf", parts.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/site.yaml")), ConfigFormat::ConfigMap);
        assert_eq!(ConfigFormat::from_path(Path::new("site.YML")), ConfigFormat::ConfigMap);
        assert_eq!(ConfigFormat::from_path(Path::new("dump.json")), ConfigFormat::Crossplane);
        assert_eq!(ConfigFormat::from_path(Path::new("nginx.conf")), ConfigFormat::Nginx);
        assert_eq!(ConfigFormat::from_path(Path::new("server")), ConfigFormat::Nginx);
    }

    #[test]
    fn test_configmap_dollar_placeholder() {
        let yaml = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: example
data:
  server.conf: |
    server {
      server_name example.test;
      location /a { return 301 https://b.test/${DOLLAR}1; }
    }
"#;
        let conf = server_conf_from_configmap(yaml).unwrap();
        assert!(conf.contains("https://b.test/$1"));
        assert!(!conf.contains("DOLLAR"));

        let tree = ConfigFormat::ConfigMap.parse(yaml).unwrap();
        assert!(tree[0].is("server"));
    }

    #[test]
    fn test_configmap_without_server_conf() {
        let err = server_conf_from_configmap("data:\n  other.conf: x\n").unwrap_err();
        assert!(matches!(err, LegacyConfigError::MissingServerConf));
    }

    #[test]
    fn test_crossplane_payload() {
        let json = r#"{
            "status": "ok",
            "errors": [],
            "config": [{
                "file": "/tmp/site_server.conf",
                "status": "ok",
                "errors": [],
                "parsed": [{
                    "directive": "http", "line": 1, "args": [],
                    "block": [{"directive": "server", "line": 1, "args": [], "block": []}]
                }]
            }]
        }"#;
        let tree = directives_from_crossplane(json).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children()[0].is("server"));
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            output_filename(Path::new("/domains/example.test.yaml")),
            "example_test_server.conf"
        );
        assert_eq!(output_filename(Path::new("plain")), "_server.conf");
    }
}
