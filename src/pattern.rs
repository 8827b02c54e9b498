//! Route pattern compilation.
//!
//! A pattern is literal text with `@name` placeholders:
//!
//! ```text
//! /users/@id/posts/@post     →  ^/users/([^/]+)/posts/([^/]+)$
//! /files/report.@ext         →  ^/files/report\.([^/]+)$
//! ```
//!
//! A placeholder is `@` followed by one or more `[A-Za-z0-9_]` characters and
//! captures one path segment (one or more non-slash characters). Everything
//! else, `.` and `+` included, is matched literally. Matching is anchored at
//! both ends; `/user/@id` does not match `/user/42/extra`.

use std::collections::HashMap;

use regex::Regex;

use crate::error::Error;

/// A compiled route pattern. Built once at registration.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl Pattern {
    /// Compiles `source` into an anchored matcher.
    ///
    /// Fails when the same placeholder name appears twice.
    pub fn compile(source: &str) -> Result<Self, Error> {
        let mut expr = String::with_capacity(source.len() + 8);
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();

        expr.push('^');
        let mut chars = source.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c != '@' {
                literal.push(c);
                continue;
            }

            let mut end = start + 1;
            while let Some(&(i, next)) = chars.peek() {
                if !is_name_char(next) {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }

            // A bare `@` is just a character.
            if end == start + 1 {
                literal.push('@');
                continue;
            }

            let name = &source[start + 1..end];
            if names.iter().any(|n| n == name) {
                return Err(Error::InvalidArgument(format!(
                    "placeholder `@{name}` appears more than once in `{source}`"
                )));
            }

            expr.push_str(&regex::escape(&literal));
            literal.clear();
            expr.push_str("([^/]+)");
            names.push(name.to_owned());
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| Error::InvalidArgument(e.to_string()))?;
        Ok(Self { source: source.to_owned(), regex, names })
    }

    /// Matches `path` against the whole pattern, returning the captured
    /// placeholder values keyed by name.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let params = self.names.iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1).map(|m| (name.clone(), m.as_str().to_owned()))
            })
            .collect();
        Some(params)
    }

    /// Placeholder names in the order they appear.
    pub fn names(&self) -> &[String] { &self.names }

    pub fn as_str(&self) -> &str { &self.source }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
