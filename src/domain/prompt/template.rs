use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::error::{DomainError, DomainResult};

/// Matches `{{variable}}` tokens. Token names are identifiers:
/// a letter or underscore followed by letters, digits or underscores.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").expect("invalid token regex")
});

/// A parsed prompt body with its `{{variable}}` tokens extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    raw: String,
    tokens: Vec<String>,
}

impl PromptTemplate {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut tokens = Vec::new();
        for capture in TOKEN_PATTERN.captures_iter(&raw) {
            let name = capture[1].to_string();
            if !tokens.contains(&name) {
                tokens.push(name);
            }
        }
        Self { raw, tokens }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Token names in order of first appearance, deduplicated.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Substitutes every token with its value. Fails if any token has no
    /// value supplied.
    pub fn render(&self, values: &HashMap<String, String>) -> DomainResult<String> {
        let mut missing = Vec::new();
        let rendered = TOKEN_PATTERN.replace_all(&self.raw, |caps: &regex::Captures| {
            let name = &caps[1];
            match values.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        });
        if missing.is_empty() {
            Ok(rendered.into_owned())
        } else {
            Err(DomainError::validation(format!(
                "no value for variable(s): {}",
                missing.join(", ")
            )))
        }
    }
}
