//! Directive tree nodes, shaped like crossplane's JSON output.

use serde::{Deserialize, Serialize};

/// One nginx directive, with its nested block if it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Directive name, e.g. `location`.
    pub directive: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// 1-based source line, 0 when unknown.
    #[serde(default)]
    pub line: usize,
    /// Child directives; `None` for simple directives ending in `;`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Vec<Directive>>,
}

impl Directive {
    /// Creates a simple directive.
    pub fn new<I, S>(directive: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            directive: directive.into(),
            args: args.into_iter().map(Into::into).collect(),
            line: 0,
            block: None,
        }
    }

    /// Turns this into a block directive with the given children.
    pub fn with_block(mut self, block: Vec<Directive>) -> Self {
        self.block = Some(block);
        self
    }

    /// Sets the source line.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Child directives, empty for simple directives.
    pub fn children(&self) -> &[Directive] {
        self.block.as_deref().unwrap_or_default()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn is(&self, name: &str) -> bool {
        self.directive == name
    }
}

/// Collects `server` blocks at the top level or inside `http` blocks.
pub fn find_server_blocks(directives: &[Directive]) -> Vec<&Directive> {
    let mut servers = Vec::new();
    for directive in directives {
        if directive.is("server") {
            servers.push(directive);
        } else if directive.is("http") {
            servers.extend(directive.children().iter().filter(|d| d.is("server")));
        }
    }
    servers
}
