//! Table-driven field rules.
//!
//! Each field of a request is located by an ordered list of patterns; the
//! first pattern with a capture wins. Every hit is kept as a [`RawMatch`].

use regex::Regex;

use crate::model::RawMatch;

/// How to locate one field in ticket text.
pub struct FieldRule {
    pub field: &'static str,
    pub patterns: Vec<Regex>,
    /// Captures that are sentence words rather than values ("named", "in").
    pub reject: &'static [&'static str],
}

impl FieldRule {
    pub fn new(field: &'static str, sources: &[&str]) -> Self {
        Self {
            field,
            patterns: sources.iter().map(|p| Regex::new(p).unwrap()).collect(),
            reject: &[],
        }
    }

    pub fn rejecting(mut self, words: &'static [&'static str]) -> Self {
        self.reject = words;
        self
    }

    /// First accepted capture in `text`, recorded into `raw`.
    pub fn find(&self, text: &str, raw: &mut Vec<RawMatch>) -> Option<String> {
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(value) = caps.get(1) else {
                    continue;
                };
                let value = value.as_str().trim();
                if value.is_empty() || self.is_rejected(value) {
                    continue;
                }
                raw.push(RawMatch {
                    field: self.field.to_string(),
                    pattern: pattern.as_str().to_string(),
                    value: value.to_string(),
                });
                return Some(value.to_string());
            }
        }
        None
    }

    fn is_rejected(&self, value: &str) -> bool {
        self.reject.iter().any(|w| w.eq_ignore_ascii_case(value))
    }
}
