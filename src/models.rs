//! Defines the core data structures used in the email-harvester application.

use serde::{Deserialize, Serialize};

/// A single contact-intelligence record, keyed by its lowercase email address.
///
/// Records follow first-writer-wins semantics: once an email is in the store
/// a later sighting never overwrites it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct ContactRecord {
    /// The discovered email address (lowercase).
    pub email: String,
    /// Name inferred from the email's local part; empty when inference failed.
    pub name: String,
    /// Inferred seniority tier ("executive", "senior", "mid", "junior" or "unknown").
    pub seniority: String,
    /// Inferred department; "General" when nothing scored.
    pub department: String,
    /// Heuristic confidence in [0.3, 0.95] for classified records.
    pub confidence: f64,
    /// URL of the page or document where the email was first seen.
    pub source_url: String,
    /// Short textual context around the email on the source page.
    pub context_snippet: String,
}

impl ContactRecord {
    /// A degraded record for an email found inside a mined document, where
    /// no page context is available.
    pub(crate) fn from_document(email: String, source_url: String) -> Self {
        Self {
            email,
            name: String::new(),
            seniority: "unknown".to_string(),
            department: "General".to_string(),
            confidence: 0.4,
            source_url,
            context_snippet: "From document".to_string(),
        }
    }
}

/// Completion signal returned to the caller when a crawl finishes.
#[derive(Debug, Clone, Default)]
pub(crate) struct CrawlSummary {
    /// Total unique records merged into the store.
    pub total_records: usize,
    /// Fetch attempts that counted against the page budget.
    pub pages_fetched: usize,
    /// Document URLs scheduled for mining.
    pub documents_seen: usize,
}
