//! Token grammar: `{{GENERATE:body}}`, `{{LOGO:body}}`, `{{PEXELS:body}}`.

use crate::Aspect;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::ops::Range;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(GENERATE|LOGO|PEXELS):([^{}]*)\}\}").expect("placeholder token pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Generate,
    Logo,
    Pexels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub kind: PlaceholderKind,
    pub body: &'a str,
    /// Byte range of the whole token in the scanned text.
    pub range: Range<usize>,
}

/// Every token in `text`, in order. Tokens with a blank body are skipped.
pub fn scan(text: &str) -> Vec<Placeholder<'_>> {
    TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(2)?.as_str();
            if body.trim().is_empty() {
                return None;
            }
            let kind = match caps.get(1)?.as_str() {
                "GENERATE" => PlaceholderKind::Generate,
                "LOGO" => PlaceholderKind::Logo,
                _ => PlaceholderKind::Pexels,
            };
            Some(Placeholder {
                kind,
                body,
                range: whole.range(),
            })
        })
        .collect()
}

/// A parsed GENERATE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratePrompt {
    /// The prompt as written, minus quotes and the aspect hint.
    pub prompt: String,
    /// Lowercased, whitespace-collapsed form used for hashing.
    pub normalized: String,
    pub aspect: Option<Aspect>,
}

impl GeneratePrompt {
    /// Tokens scanned out of serialized JSON carry escaped quotes; those
    /// count as plain quotes.
    pub fn parse(body: &str) -> Option<GeneratePrompt> {
        let body = body.replace("\\\"", "\"");
        let (prompt, aspect) = match body.rsplit_once('|') {
            Some((head, hint)) => match Aspect::parse_hint(hint) {
                Some(aspect) => (head, Some(aspect)),
                None => (body.as_str(), None),
            },
            None => (body.as_str(), None),
        };
        let prompt = strip_quotes(prompt.trim()).trim().to_string();
        let normalized = normalize_prompt(&prompt);
        if normalized.is_empty() {
            return None;
        }
        Some(GeneratePrompt {
            prompt,
            normalized,
            aspect,
        })
    }

    /// The aspect actually requested, given the configured default.
    pub fn effective_aspect(&self, default: Aspect) -> Aspect {
        self.aspect.unwrap_or(default)
    }

    /// Cache key. The aspect only takes part when it overrides the default,
    /// so an explicit hint equal to the default hashes like no hint at all.
    pub fn hash(&self, default: Aspect) -> String {
        match self.aspect {
            Some(aspect) if aspect != default => prompt_hash(&format!("{}|{}", self.normalized, aspect)),
            _ => prompt_hash(&self.normalized),
        }
    }
}

/// Strips quotes, lowercases and collapses runs of whitespace.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}'))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex SHA-256 of an already normalized prompt.
pub fn prompt_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn strip_quotes(s: &str) -> &str {
    let quoted = |open: char, close: char| s.strip_prefix(open).and_then(|r| r.strip_suffix(close));
    quoted('"', '"')
        .or_else(|| quoted('\'', '\''))
        .or_else(|| quoted('\u{201C}', '\u{201D}'))
        .unwrap_or(s)
}
