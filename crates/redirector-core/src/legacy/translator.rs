//! Translation of nginx `server` blocks into redirect rule records.
//!
//! Only `server_name`, `location`, `rewrite` and `return` carry meaning;
//! every other directive is ignored. Anything we cannot express as a rule
//! becomes a [`TranslationWarning`] and translation moves on.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::legacy::directive::Directive;
use crate::models::RuleRecord;
use crate::uri::decompose;

/// Location modifiers that make the match case-sensitive.
const CASE_SENSITIVE_MODIFIERS: [&str; 2] = ["=", "~"];

/// All location modifiers nginx accepts.
const LOCATION_MODIFIERS: [&str; 4] = ["=", "~", "~*", "^~"];

/// Modifiers whose matching semantics the rule model cannot reproduce.
const LOSSY_MODIFIERS: [&str; 2] = ["=", "^~"];

/// Translation knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslateOptions {
    /// Attach raw source values to each emitted rule.
    pub include_debug_data: bool,
}

/// A construct that could not be translated faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationWarning {
    pub message: String,
    /// `server_name` values known when the warning was raised.
    pub domain: Vec<String>,
    pub filename: String,
    pub directive: Directive,
}

/// Raw source values behind an emitted rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDebugInfo {
    pub raw_path: String,
    pub raw_destination: String,
    /// `rewrite` or `return`.
    pub source_directive: String,
}

/// A rule produced by translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedRule {
    #[serde(flatten)]
    pub record: RuleRecord,
    #[serde(flatten)]
    pub debug: Option<RuleDebugInfo>,
}

/// Output for one `server` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerTranslation {
    pub domain_names: Vec<String>,
    pub rules: Vec<TranslatedRule>,
    pub warnings: Vec<TranslationWarning>,
}

impl ServerTranslation {
    /// Plain rule records, without debug data.
    pub fn records(&self) -> impl Iterator<Item = &RuleRecord> {
        self.rules.iter().map(|rule| &rule.record)
    }
}

enum DirectiveKind {
    ServerName,
    Location,
    Rewrite,
    Return,
    Ignored,
}

impl DirectiveKind {
    fn of(directive: &Directive) -> Self {
        match directive.directive.as_str() {
            "server_name" => DirectiveKind::ServerName,
            "location" => DirectiveKind::Location,
            "rewrite" => DirectiveKind::Rewrite,
            "return" => DirectiveKind::Return,
            _ => DirectiveKind::Ignored,
        }
    }
}

/// Decomposed `location` a rewrite or return sits in.
#[derive(Debug, Clone)]
struct LocationContext {
    modifier: Option<String>,
    raw_path: String,
    path: String,
    case_sensitive: bool,
    match_subpaths: bool,
}

impl LocationContext {
    fn lossy_modifier(&self) -> Option<&str> {
        self.modifier
            .as_deref()
            .filter(|m| LOSSY_MODIFIERS.contains(m))
    }
}

/// Why a single directive produced no rule.
enum Skip {
    Warn(String),
    Parse(ParseError),
}

impl From<ParseError> for Skip {
    fn from(err: ParseError) -> Self {
        Skip::Parse(err)
    }
}

impl Skip {
    fn warn(message: impl Into<String>) -> Self {
        Skip::Warn(message.into())
    }

    fn into_message(self) -> String {
        match self {
            Skip::Warn(message) => message,
            Skip::Parse(err) => err.message().to_string(),
        }
    }
}

/// Walks one `server` block.
pub struct ServerBlockTranslator<'a> {
    filename: &'a str,
    options: TranslateOptions,
    output: ServerTranslation,
}

impl<'a> ServerBlockTranslator<'a> {
    pub fn new(filename: &'a str, options: TranslateOptions) -> Self {
        Self {
            filename,
            options,
            output: ServerTranslation::default(),
        }
    }

    /// Translates the children of a `server` directive.
    pub fn translate(mut self, server: &Directive) -> ServerTranslation {
        for directive in server.children() {
            self.process(directive, None);
        }

        debug!(
            filename = self.filename,
            domains = ?self.output.domain_names,
            rules = self.output.rules.len(),
            warnings = self.output.warnings.len(),
            "Translated server block"
        );
        self.output
    }

    fn process(&mut self, directive: &Directive, parent: Option<&LocationContext>) {
        let result = match DirectiveKind::of(directive) {
            DirectiveKind::ServerName => {
                self.output.domain_names = directive.args.clone();
                Ok(())
            }
            DirectiveKind::Location => self.location(directive),
            DirectiveKind::Rewrite => self.rewrite(directive, parent),
            DirectiveKind::Return => self.return_directive(directive, parent),
            DirectiveKind::Ignored => Ok(()),
        };

        if let Err(skip) = result {
            self.warn(skip.into_message(), directive);
        }
    }

    fn warn(&mut self, message: impl Into<String>, directive: &Directive) {
        let message = message.into();
        warn!(
            filename = self.filename,
            line = directive.line,
            directive = %directive.directive,
            "{}",
            message
        );
        self.output.warnings.push(TranslationWarning {
            message,
            domain: self.output.domain_names.clone(),
            filename: self.filename.to_string(),
            directive: directive.clone(),
        });
    }

    fn warn_lossy_modifier(&mut self, directive: &Directive, parent: &LocationContext) {
        if let Some(modifier) = parent.lossy_modifier() {
            self.warn(format!("Location directive {modifier} found"), directive);
        }
    }

    fn location(&mut self, directive: &Directive) -> Result<(), Skip> {
        let children = directive.children();
        if children.len() > 1 {
            return Err(Skip::warn(
                "More than one directive in location block, skipping",
            ));
        }

        let (modifier, raw_path) = match directive.args.as_slice() {
            [modifier, path, ..] if LOCATION_MODIFIERS.contains(&modifier.as_str()) => {
                (Some(modifier.clone()), path.clone())
            }
            [path, ..] if !LOCATION_MODIFIERS.contains(&path.as_str()) => (None, path.clone()),
            _ => return Err(Skip::warn("Location directive has no path")),
        };

        let case_sensitive = modifier
            .as_deref()
            .map_or(true, |m| CASE_SENSITIVE_MODIFIERS.contains(&m));
        let parsed = decompose(&raw_path)?;

        let context = LocationContext {
            modifier,
            raw_path,
            path: parsed.uri,
            case_sensitive,
            match_subpaths: parsed.match_subpaths,
        };

        for child in children {
            self.process(child, Some(&context));
        }
        Ok(())
    }

    fn rewrite(
        &mut self,
        directive: &Directive,
        parent: Option<&LocationContext>,
    ) -> Result<(), Skip> {
        let Some(parent) = parent else {
            return Err(Skip::warn("Rewrite directive found in server block"));
        };
        self.warn_lossy_modifier(directive, parent);

        let (raw_regex, replacement, flag) = match directive.args.as_slice() {
            [regex, replacement, flag] => (regex, replacement, flag.as_str()),
            [regex, replacement] if replacement.starts_with("http") => {
                (regex, replacement, "permanent")
            }
            [regex, replacement] => (regex, replacement, "redirect"),
            _ => {
                return Err(Skip::warn(
                    "Invalid number of arguments in rewrite directive",
                ))
            }
        };

        let regex = raw_regex.trim_matches(|c: char| c == '^' || c == '$');
        if !regex.starts_with(&parent.path) {
            return Err(Skip::warn(
                "Rewrite directive regex does not match parent location",
            ));
        }
        if flag != "redirect" && flag != "permanent" {
            return Err(Skip::warn(format!(
                "Unsupported rewrite flag {flag}, only redirect and permanent are supported"
            )));
        }

        let parsed_regex = decompose(regex)?;
        let parsed_replacement = decompose(replacement)?;

        let record = RuleRecord {
            path: parsed_regex.uri,
            destination: parsed_replacement.uri,
            permanent: Some(flag == "permanent"),
            case_sensitive: Some(parent.case_sensitive),
            match_subpaths: Some(parsed_regex.match_subpaths),
            append_subpath: Some(parsed_replacement.append_subpath),
            // nginx forwards the query string unless the replacement ends in '?'
            pass_query_string: Some(
                parsed_replacement.pass_query_string || !replacement.ends_with('?'),
            ),
            notes: None,
        };
        self.emit(record, regex, replacement, "rewrite");
        Ok(())
    }

    fn return_directive(
        &mut self,
        directive: &Directive,
        parent: Option<&LocationContext>,
    ) -> Result<(), Skip> {
        let Some(parent) = parent else {
            return Err(Skip::warn("Return directive found in server block"));
        };
        self.warn_lossy_modifier(directive, parent);

        let [code, destination] = directive.args.as_slice() else {
            return Err(Skip::warn(
                "Invalid number of arguments in return directive",
            ));
        };
        if code != "301" && code != "302" {
            return Err(Skip::warn(format!(
                "Invalid response code {code} in return directive"
            )));
        }

        let parsed = decompose(destination)?;
        if parsed.match_subpaths {
            return Err(Skip::warn(format!(
                "Unexpected capture group in return destination {destination}"
            )));
        }

        let record = RuleRecord {
            path: parent.path.clone(),
            destination: parsed.uri,
            permanent: Some(code == "301"),
            case_sensitive: Some(parent.case_sensitive),
            match_subpaths: Some(parent.match_subpaths),
            append_subpath: Some(parsed.append_subpath),
            pass_query_string: Some(parsed.pass_query_string),
            notes: None,
        };
        self.emit(record, &parent.raw_path, destination, "return");
        Ok(())
    }

    fn emit(&mut self, record: RuleRecord, raw_path: &str, raw_destination: &str, source: &str) {
        let debug = self.options.include_debug_data.then(|| RuleDebugInfo {
            raw_path: raw_path.to_string(),
            raw_destination: raw_destination.to_string(),
            source_directive: source.to_string(),
        });
        self.output.rules.push(TranslatedRule { record, debug });
    }
}
