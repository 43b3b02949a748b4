//! Minimal nginx config parser.
//!
//! Produces the same tree shape crossplane does for the subset we care
//! about: words, quoted strings, `#` comments, `;`-terminated directives and
//! `{ }` blocks. Includes are not followed.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::LegacyConfigError;
use crate::legacy::directive::Directive;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word { value: String, line: usize },
    Semicolon(usize),
    OpenBrace(usize),
    CloseBrace(usize),
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    tokens: Vec<Token>,
    word: String,
    word_line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            tokens: Vec::new(),
            word: String::new(),
            word_line: 1,
        }
    }

    fn flush(&mut self) {
        if !self.word.is_empty() {
            self.tokens.push(Token::Word {
                value: std::mem::take(&mut self.word),
                line: self.word_line,
            });
        }
    }

    fn push_char(&mut self, c: char) {
        if self.word.is_empty() {
            self.word_line = self.line;
        }
        if c == '\n' {
            self.line += 1;
        }
        self.word.push(c);
    }

    fn skip_comment(&mut self) {
        for c in self.chars.by_ref() {
            if c == '\n' {
                self.line += 1;
                break;
            }
        }
    }

    fn read_quoted(&mut self, quote: char) -> Result<(), LegacyConfigError> {
        let start = self.line;
        self.word_line = start;
        let mut value = String::new();

        loop {
            match self.chars.next() {
                None => return Err(LegacyConfigError::UnterminatedQuote { line: start }),
                Some(c) if c == quote => break,
                Some('\\') => match self.chars.next() {
                    Some(c) if c == quote => value.push(c),
                    Some(c) => {
                        if c == '\n' {
                            self.line += 1;
                        }
                        value.push('\\');
                        value.push(c);
                    }
                    None => return Err(LegacyConfigError::UnterminatedQuote { line: start }),
                },
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    value.push(c);
                }
            }
        }

        self.tokens.push(Token::Word { value, line: start });
        Ok(())
    }

    /// Reads `${name}` variable syntax into the current word.
    fn read_braced_variable(&mut self) {
        self.push_char('{');
        while let Some(c) = self.chars.next() {
            self.push_char(c);
            if c == '}' {
                break;
            }
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LegacyConfigError> {
        while let Some(c) = self.chars.next() {
            match c {
                '\n' => {
                    self.flush();
                    self.line += 1;
                }
                c if c.is_whitespace() => self.flush(),
                '#' if self.word.is_empty() => self.skip_comment(),
                '"' | '\'' if self.word.is_empty() => self.read_quoted(c)?,
                '{' if self.word.ends_with('$') => self.read_braced_variable(),
                ';' => {
                    self.flush();
                    self.tokens.push(Token::Semicolon(self.line));
                }
                '{' => {
                    self.flush();
                    self.tokens.push(Token::OpenBrace(self.line));
                }
                '}' => {
                    self.flush();
                    self.tokens.push(Token::CloseBrace(self.line));
                }
                '\\' => {
                    self.push_char(c);
                    if let Some(next) = self.chars.next() {
                        self.push_char(next);
                    }
                }
                c => self.push_char(c),
            }
        }

        self.flush();
        Ok(self.tokens)
    }
}

fn parse_block<I>(tokens: &mut I, nested: bool) -> Result<Vec<Directive>, LegacyConfigError>
where
    I: Iterator<Item = Token>,
{
    let mut directives = Vec::new();

    loop {
        let (name, line) = match tokens.next() {
            Some(Token::Word { value, line }) => (value, line),
            Some(Token::CloseBrace(_)) if nested => return Ok(directives),
            Some(Token::CloseBrace(line)) => {
                return Err(LegacyConfigError::UnexpectedToken {
                    token: "}".into(),
                    line,
                })
            }
            Some(Token::Semicolon(line)) => {
                return Err(LegacyConfigError::UnexpectedToken {
                    token: ";".into(),
                    line,
                })
            }
            Some(Token::OpenBrace(line)) => {
                return Err(LegacyConfigError::UnexpectedToken {
                    token: "{".into(),
                    line,
                })
            }
            None if nested => return Err(LegacyConfigError::UnexpectedEof { expected: "}" }),
            None => return Ok(directives),
        };

        let mut directive = Directive::new(name, Vec::<String>::new()).at_line(line);
        loop {
            match tokens.next() {
                Some(Token::Word { value, .. }) => directive.args.push(value),
                Some(Token::Semicolon(_)) => break,
                Some(Token::OpenBrace(_)) => {
                    directive.block = Some(parse_block(tokens, true)?);
                    break;
                }
                Some(Token::CloseBrace(line)) => {
                    return Err(LegacyConfigError::UnexpectedToken {
                        token: "}".into(),
                        line,
                    })
                }
                None => return Err(LegacyConfigError::UnexpectedEof { expected: ";" }),
            }
        }
        directives.push(directive);
    }
}

/// Parses nginx config text into a directive tree.
pub fn parse_config(input: &str) -> Result<Vec<Directive>, LegacyConfigError> {
    let tokens = Lexer::new(input).run()?;
    parse_block(&mut tokens.into_iter(), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_blocks() {
        let config = r#"
server {
    server_name example.test www.example.test;  # trailing comment
    location /old {
        return 301 https://example.test;
    }
}
"#;
        let tree = parse_config(config).unwrap();
        assert_eq!(tree.len(), 1);

        let server = &tree[0];
        assert!(server.is("server"));
        assert_eq!(server.line, 2);
        assert_eq!(server.children().len(), 2);
        assert_eq!(
            server.children()[0].args,
            vec!["example.test".to_string(), "www.example.test".to_string()]
        );

        let location = &server.children()[1];
        assert_eq!(location.args, vec!["/old".to_string()]);
        assert_eq!(location.line, 4);
        assert_eq!(location.children()[0].args[1], "https://example.test");
    }

    #[test]
    fn test_quoted_strings() {
        let tree = parse_config(r#"rewrite "^/a b$" '/c\'d' permanent;"#).unwrap();
        assert_eq!(tree[0].args, vec!["^/a b$", "/c'd", "permanent"]);
    }

    #[test]
    fn test_braced_variables_stay_in_word() {
        let tree = parse_config("return 301 https://${host}/x;").unwrap();
        assert_eq!(tree[0].args[1], "https://${host}/x");
        assert!(tree[0].block.is_none());
    }

    #[test]
    fn test_regex_location() {
        let tree = parse_config("location ~* ^/foo(/.*)?$ { rewrite ^/foo/(.*)$ /bar/$1; }").unwrap();
        assert_eq!(tree[0].args, vec!["~*", "^/foo(/.*)?$"]);
        assert_eq!(tree[0].children()[0].args, vec!["^/foo/(.*)$", "/bar/$1"]);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_config("server { listen 80;"),
            Err(LegacyConfigError::UnexpectedEof { expected: "}" })
        ));
        assert!(matches!(
            parse_config("listen 80"),
            Err(LegacyConfigError::UnexpectedEof { expected: ";" })
        ));
        assert!(matches!(
            parse_config("}\n"),
            Err(LegacyConfigError::UnexpectedToken { line: 1, .. })
        ));
        assert!(matches!(
            parse_config("return 301 \"oops;"),
            Err(LegacyConfigError::UnterminatedQuote { line: 1 })
        ));
    }
}
