//! Text helpers shared by collectors, the generator and the sender.
//!
//! This module provides:
//! - String truncation for logging and for capping item fields
//! - Whitespace collapsing and markup stripping for feed text
//! - The AI keyword filter used by the product-discovery collector

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// ASCII keywords, matched on word boundaries so "ai" does not match "said".
static AI_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(ai|llms?|gpt|chatbots?|machine learning|agents?|agentic|artificial intelligence|automation|models?|neural|copilot|genai|rag)\b",
    )
    .unwrap()
});

/// CJK keywords have no word boundaries, so they are matched as substrings.
const AI_KEYWORDS_CJK: &[&str] = &["人工智能", "人工智慧", "机器学习", "機器學習", "大模型", "生成式", "智能体", "智能"];

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (rounded down to a character
/// boundary) with an ellipsis and byte count appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Strip markup from an HTML fragment, returning collapsed plain text.
///
/// Feed descriptions are frequently HTML, sometimes escaped twice; parsing
/// as a fragment decodes entities and drops tags in one pass.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }
    let doc = Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Whether `text` mentions an AI-related keyword.
pub fn mentions_ai(text: &str) -> bool {
    AI_KEYWORDS.is_match(text) || AI_KEYWORDS_CJK.iter().any(|k| text.contains(k))
}
