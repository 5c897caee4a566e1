//! Email extraction and heuristic contact classification.
//!
//! Everything in this module is deterministic given the same input text and
//! keyword tables: no I/O, no randomness. The crawler feeds it visible page
//! text plus raw HTML and merges the resulting records into the shared store.

use crate::config::{Config, EMAIL_REGEX};
use crate::models::ContactRecord;
use crate::scope::TargetScope;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static AT_BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\[(]\s*at\s*[\])]\s*").unwrap());
static DOT_BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\[(]\s*dot\s*[\])]\s*").unwrap());
static DOT_SPACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+dot\s+").unwrap());
static AT_SPACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+at\s+").unwrap());

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Extracts the visible text of an HTML document, one text fragment per line,
/// so the snippet heuristic can reason about "the line containing the email".
/// Script and style contents are not visible text and are skipped.
pub(crate) fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    for node in root.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name().to_lowercase()))
            .is_some_and(|name| name == "script" || name == "style");
        if hidden {
            continue;
        }
        let trimmed = fragment.trim();
        if !trimmed.is_empty() {
            text.push_str(trimmed);
            text.push('\n');
        }
    }
    text
}

/// Normalizes human-readable email obfuscations ("jane [at] univ [dot] edu",
/// "jane [at] univ dot edu") into standard `@`/`.` form.
///
/// The spaced "at"/"dot" words are everyday prose, so they are only rewritten
/// when a bracketed marker shows the text really spells out addresses.
fn deobfuscate(text: &str) -> String {
    let bracketed = AT_BRACKETED.is_match(text) || DOT_BRACKETED.is_match(text);
    let step = AT_BRACKETED.replace_all(text, "@");
    let step = DOT_BRACKETED.replace_all(&step, ".");
    if !bracketed {
        return step.into_owned();
    }
    let step = DOT_SPACED.replace_all(&step, ".");
    AT_SPACED.replace_all(&step, "@").into_owned()
}

/// Finds all in-scope email addresses in a fetched page.
///
/// Scans the raw HTML (catches `mailto:` hrefs and attribute text), the
/// visible text, and a de-obfuscated copy of the visible text. Results are
/// lowercased; the ordered set both deduplicates the three passes and keeps
/// downstream record merging deterministic.
pub(crate) fn extract_emails(
    raw_html: &str,
    text: &str,
    scope: &TargetScope,
) -> BTreeSet<String> {
    let mut emails = BTreeSet::new();
    let deobfuscated = deobfuscate(text);

    for source in [raw_html, text, deobfuscated.as_str()] {
        for m in EMAIL_REGEX.find_iter(source) {
            let email = m.as_str().to_lowercase();
            if scope.in_scope_email(&email) {
                emails.insert(email);
            }
        }
    }
    emails
}

/// Classifies one accepted email against its page text, producing a full
/// record with inferred name, seniority, department, confidence and snippet.
pub(crate) fn classify_record(
    text: &str,
    email: &str,
    source_url: &str,
    config: &Config,
) -> ContactRecord {
    let clean_text = WHITESPACE.replace_all(text, " ").to_lowercase();

    let name = infer_name(email);

    let (seniority, seniority_score) =
        score_keyword_groups(&clean_text, &config.seniority_keywords);
    let seniority = seniority.unwrap_or_else(|| "unknown".to_string());

    let (department, department_score) =
        score_keyword_groups(&clean_text, &config.department_keywords);
    let department = department.unwrap_or_else(|| "General".to_string());

    let mut confidence: f64 = 0.3;
    if !name.is_empty() {
        confidence += 0.2;
    }
    if seniority != "unknown" {
        confidence += 0.15;
    }
    if department != "General" {
        confidence += 0.15;
    }
    if seniority_score + department_score > 2 {
        confidence += 0.2;
    }
    let confidence = (confidence.min(0.95) * 100.0).round() / 100.0;

    ContactRecord {
        email: email.to_string(),
        name,
        seniority,
        department,
        confidence,
        source_url: source_url.to_string(),
        context_snippet: context_snippet(text, email),
    }
}

/// Derives a display name from the email's local part: split on `.`/`_`/`-`,
/// and when the first two tokens each have more than one character, title-case
/// and join them. Returns an empty string when no name can be inferred.
fn infer_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let parts: Vec<&str> = local
        .split(|c| c == '.' || c == '_' || c == '-')
        .collect();
    if parts.len() >= 2 && parts[..2].iter().all(|p| p.chars().count() > 1) {
        parts[..2]
            .iter()
            .map(|p| title_case(p))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        String::new()
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Scores each keyword group by counting its keywords present in the text.
/// Only a strictly higher score displaces the current winner, so the first
/// group reaching the maximum wins ties. Group iteration order is the
/// tie-breaking contract carried by the config tables.
fn score_keyword_groups(
    clean_text: &str,
    groups: &[(String, Vec<String>)],
) -> (Option<String>, usize) {
    let mut winner = None;
    let mut max_score = 0usize;
    for (label, keywords) in groups {
        let score = keywords
            .iter()
            .filter(|kw| clean_text.contains(kw.as_str()))
            .count();
        if score > max_score {
            max_score = score;
            winner = Some(label.clone());
        }
    }
    (winner, max_score)
}

/// Returns the line containing the email, windowed to 200 characters starting
/// 100 characters before the match. Char-indexed so multi-byte text cannot
/// split a code point.
fn context_snippet(text: &str, email: &str) -> String {
    for line in text.lines() {
        let lowered = line.to_lowercase();
        if let Some(byte_idx) = lowered.find(email) {
            let char_idx = lowered[..byte_idx].chars().count();
            let start = char_idx.saturating_sub(100);
            let snippet: String = line.chars().skip(start).take(200).collect();
            return snippet.trim().to_string();
        }
    }
    "Context not found".to_string()
}
