//! Legacy nginx configuration translation.
//!
//! Pipeline: raw input → [`source::ConfigFormat::parse`] → directive tree →
//! [`find_server_blocks`] → [`translator::ServerBlockTranslator`] per block.

pub mod directive;
pub mod parser;
pub mod source;
pub mod translator;

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::LegacyConfigError;

pub use directive::{find_server_blocks, Directive};
pub use source::{output_filename, ConfigFormat};
pub use translator::{
    RuleDebugInfo, ServerBlockTranslator, ServerTranslation, TranslateOptions, TranslatedRule,
    TranslationWarning,
};

/// Translates a directive tree, one result per `server` block.
pub fn translate_directives(
    directives: &[Directive],
    filename: &str,
    options: TranslateOptions,
) -> Vec<ServerTranslation> {
    find_server_blocks(directives)
        .into_iter()
        .map(|server| ServerBlockTranslator::new(filename, options).translate(server))
        .collect()
}

/// Translates raw nginx config text.
///
/// ```
/// use redirector_core::translate_legacy_config;
///
/// let servers = translate_legacy_config(
///     "server { server_name a.test; location /old { return 301 https://b.test; } }",
///     "a_server.conf",
/// )
/// .unwrap();
/// assert_eq!(servers[0].rules[0].record.destination, "https://b.test");
/// ```
pub fn translate_legacy_config(
    raw_config: &str,
    filename: &str,
) -> Result<Vec<ServerTranslation>, LegacyConfigError> {
    let directives = parser::parse_config(raw_config)?;
    Ok(translate_directives(
        &directives,
        filename,
        TranslateOptions::default(),
    ))
}

/// Reads and translates one input file, picking the format from its extension.
pub fn translate_file(
    path: &Path,
    options: TranslateOptions,
) -> Result<Vec<ServerTranslation>, LegacyConfigError> {
    let content = std::fs::read_to_string(path)?;
    let directives = ConfigFormat::from_path(path).parse(&content)?;
    let filename = output_filename(path);

    let servers = translate_directives(&directives, &filename, options);
    info!(
        path = %path.display(),
        servers = servers.len(),
        "Translated legacy config"
    );
    Ok(servers)
}

/// Rules of one translated `server` block, as consumed by the importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRules {
    pub domain_names: Vec<String>,
    pub rules: Vec<TranslatedRule>,
}

/// Merged translation output of a batch of files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationReport {
    pub results: Vec<DomainRules>,
    pub warnings: Vec<TranslationWarning>,
}

impl TranslationReport {
    /// Appends the server blocks of one file.
    pub fn extend(&mut self, servers: Vec<ServerTranslation>) {
        for server in servers {
            self.results.push(DomainRules {
                domain_names: server.domain_names,
                rules: server.rules,
            });
            self.warnings.extend(server.warnings);
        }
    }

    pub fn rule_count(&self) -> usize {
        self.results.iter().map(|r| r.rules.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
server {
    listen 80;
    server_name example.test www.example.test;

    location /old {
        return 301 https://example.test;
    }

    location /gone {
        return 404;
    }
}

server {
    server_name other.test;
    location ~* ^/blog/(.*)$ {
        rewrite ^/blog/(.*)$ https://blog.other.test/$1 permanent;
    }
}
"#;

    #[test]
    fn test_translate_legacy_config() {
        let servers = translate_legacy_config(CONFIG, "example_server.conf").unwrap();
        assert_eq!(servers.len(), 2);

        let first = &servers[0];
        assert_eq!(first.domain_names, vec!["example.test", "www.example.test"]);
        assert_eq!(first.rules.len(), 1);
        assert_eq!(first.warnings.len(), 1);
        assert_eq!(
            first.warnings[0].message,
            "Invalid number of arguments in return directive"
        );

        let second = &servers[1];
        let rule = &second.rules[0].record;
        assert_eq!(rule.path, "/blog/");
        assert_eq!(rule.destination, "https://blog.other.test/");
        assert_eq!(rule.match_subpaths, Some(true));
        assert_eq!(rule.append_subpath, Some(true));
        assert_eq!(rule.case_sensitive, Some(false));
    }

    #[test]
    fn test_syntax_error_fails_whole_file() {
        assert!(translate_legacy_config("server { location /a {", "x").is_err());
    }

    #[test]
    fn test_server_blocks_inside_http() {
        let wrapped = format!("http {{{CONFIG}}}");
        assert_eq!(translate_legacy_config(&wrapped, "x").unwrap().len(), 2);
    }

    #[test]
    fn test_translate_file_and_report() {
        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let servers = translate_file(file.path(), TranslateOptions::default()).unwrap();
        assert!(servers[0].warnings[0].filename.ends_with("_server.conf"));

        let mut report = TranslationReport::default();
        report.extend(servers);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.rule_count(), 2);
        assert_eq!(report.warnings.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["domain_names"][0], "example.test");
        assert!(json["results"][0].get("warnings").is_none());
    }
}
