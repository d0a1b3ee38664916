//! Per-recipient placeholder substitution
//!
//! Supported tokens: `{{email}}`, `{{index}}`, `{{domain}}`. Anything else
//! is left untouched.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"\{\{(email|index|domain)\}\}").expect("Invalid regex pattern")
    })
}

/// Domain part of an address, empty when there is no `@`
pub fn domain_of(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("")
}

/// Render `template` for the recipient at 1-based `index`
pub fn render(template: &str, email: &str, index: usize) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    // single pass, so substituted values are never re-expanded
    token_regex()
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "email" => email.to_string(),
            "index" => index.to_string(),
            _ => domain_of(email).to_string(),
        })
        .into_owned()
}
