//! Transform template micro-language.
//!
//! A transform template is free text with inline channel references, e.g.
//! `"[%4f9c…-…#title%] via RSS"`. Templates are parsed once into tokens;
//! rewriting then operates on typed references instead of re-running string
//! replacement over the whole template, so overlapping or repeated ids are
//! substituted exactly where they occur.
//!
//! Shared templates name actions instead of ids (`"[%rss.read#title%]"`).
//! [`Template::parse_shared`] only treats the target of a `[%target#field%]`
//! reference as a reference; the same action written in plain text stays
//! text.

use regex_lite::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::types::ChannelId;

fn channel_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("channel reference pattern is valid")
    })
}

fn shared_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[%([^#%\[\]]+)#").expect("shared reference pattern is valid"))
}

/// One lexical unit of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text, kept verbatim.
    Text(String),
    /// A UUID-shaped channel reference.
    ChannelRef(ChannelId),
    /// The target of a `[%target#field%]` reference in a shared template.
    ActionRef(String),
}

/// A parsed transform template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    tokens: Vec<Token>,
}

impl Template {
    /// Tokenize a template string.
    pub fn parse(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut cursor = 0;

        for m in channel_ref_pattern().find_iter(source) {
            if m.start() > cursor {
                tokens.push(Token::Text(source[cursor..m.start()].to_string()));
            }
            tokens.push(Token::ChannelRef(ChannelId::new(m.as_str())));
            cursor = m.end();
        }
        if cursor < source.len() {
            tokens.push(Token::Text(source[cursor..].to_string()));
        }

        Self { tokens }
    }

    /// Tokenize a shared template, where references name actions.
    pub fn parse_shared(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut cursor = 0;

        for target in shared_ref_pattern().captures_iter(source).filter_map(|c| c.get(1)) {
            if target.start() > cursor {
                tokens.push(Token::Text(source[cursor..target.start()].to_string()));
            }
            tokens.push(Token::ActionRef(target.as_str().to_string()));
            cursor = target.end();
        }
        if cursor < source.len() {
            tokens.push(Token::Text(source[cursor..].to_string()));
        }

        Self { tokens }
    }

    /// The tokens in order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Render with each reference replaced by `resolve(id)`.
    ///
    /// References for which `resolve` returns `None` are rendered unchanged.
    pub fn render<F>(&self, mut resolve: F) -> String
    where
        F: FnMut(&ChannelId) -> Option<String>,
    {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::ChannelRef(id) => match resolve(id) {
                    Some(replacement) => out.push_str(&replacement),
                    None => out.push_str(id.as_str()),
                },
                Token::ActionRef(action) => out.push_str(action),
            }
        }
        out
    }

    /// Render with each action reference replaced by `bind(action)`.
    ///
    /// Actions for which `bind` returns `None` are rendered unchanged.
    pub fn rebind<F>(&self, mut bind: F) -> String
    where
        F: FnMut(&str) -> Option<ChannelId>,
    {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::ChannelRef(id) => out.push_str(id.as_str()),
                Token::ActionRef(action) => match bind(action) {
                    Some(id) => out.push_str(id.as_str()),
                    None => out.push_str(action),
                },
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|_| None))
    }
}
