//! Document mining: download referenced documents and harvest emails from
//! their extracted text.
//!
//! Text extraction is delegated to external tools (`pdftotext` for PDFs,
//! `strings` for the office formats). Every failure along the way is a soft
//! skip contributing zero records; mining must never abort the crawl.

use crate::config::{Config, EMAIL_REGEX};
use crate::models::ContactRecord;
use crate::scope::TargetScope;
use reqwest::Client;
use std::io::Write;
use tokio::process::Command;
use url::Url;

/// Downloads `doc_url`, extracts its text and returns degraded contact
/// records for every in-scope email found. Failures yield an empty list.
pub(crate) async fn mine_document(
    client: &Client,
    doc_url: &str,
    scope: &TargetScope,
    config: &Config,
) -> Vec<ContactRecord> {
    match mine_document_inner(client, doc_url, scope, config).await {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!(target: "doc_miner", "Skipping document {}: {}", doc_url, e);
            Vec::new()
        }
    }
}

async fn mine_document_inner(
    client: &Client,
    doc_url: &str,
    scope: &TargetScope,
    config: &Config,
) -> anyhow::Result<Vec<ContactRecord>> {
    let url = Url::parse(doc_url)?;
    let Some(extension) = document_extension(&url, config) else {
        tracing::debug!(target: "doc_miner", "Unsupported document extension: {}", doc_url);
        return Ok(Vec::new());
    };

    let response = client.get(doc_url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {} downloading document", response.status());
    }
    let bytes = response.bytes().await?;

    // Scratch file is released when the handle drops, tool failure included.
    let mut scratch = tempfile::Builder::new()
        .prefix("harvest_doc_")
        .suffix(&extension)
        .tempfile()?;
    scratch.write_all(&bytes)?;

    let text = extract_document_text(scratch.path(), &extension).await?;
    Ok(emails_from_text(&text, scope)
        .into_iter()
        .map(|email| ContactRecord::from_document(email, doc_url.to_string()))
        .collect())
}

/// Returns the recognized document extension of the URL path (with dot,
/// lowercase), or None when the path is not a minable document.
fn document_extension(url: &Url, config: &Config) -> Option<String> {
    let path = url.path().to_lowercase();
    config
        .document_extensions
        .iter()
        .find(|ext| path.ends_with(ext.as_str()))
        .cloned()
}

/// Shells out to the per-format extraction tool and returns best-effort
/// plain text.
async fn extract_document_text(
    path: &std::path::Path,
    extension: &str,
) -> anyhow::Result<String> {
    let output = if extension == ".pdf" {
        Command::new("pdftotext")
            .arg("-layout")
            .arg(path)
            .arg("-")
            .output()
            .await?
    } else {
        Command::new("strings").arg(path).output().await?
    };

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Direct email-pattern pass over extracted document text, scope-filtered
/// and lowercased. No de-obfuscation for documents.
pub(crate) fn emails_from_text(text: &str, scope: &TargetScope) -> Vec<String> {
    let mut emails: Vec<String> = EMAIL_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|email| scope.in_scope_email(email))
        .collect();
    emails.sort();
    emails.dedup();
    emails
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn scope() -> TargetScope {
        TargetScope::from_root_url("https://univ.edu").unwrap()
    }

    #[test]
    fn test_emails_from_text_filters_and_dedups() {
        let text = "Contact a.khan@univ.edu or A.Khan@univ.edu\nexternal: x@gmail.com";
        let emails = emails_from_text(text, &scope());
        assert_eq!(emails, vec!["a.khan@univ.edu"]);
    }

    #[test]
    fn test_document_extension_recognition() {
        let config = Config::default();
        let pdf = Url::parse("https://univ.edu/files/Handbook.PDF").unwrap();
        assert_eq!(document_extension(&pdf, &config), Some(".pdf".to_string()));

        let docx = Url::parse("https://univ.edu/files/list.docx?v=2").unwrap();
        assert_eq!(document_extension(&docx, &config), Some(".docx".to_string()));

        let html = Url::parse("https://univ.edu/about").unwrap();
        assert_eq!(document_extension(&html, &config), None);
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_skipped_without_download() {
        let config = Config::default();
        // The URL is unreachable; an unsupported extension must short-circuit
        // before any network activity.
        let client = Client::new();
        let records = mine_document(
            &client,
            "https://univ.edu/files/notes.txt",
            &scope(),
            &config,
        )
        .await;
        assert!(records.is_empty());
    }

    #[test]
    fn test_document_record_shape() {
        let record = ContactRecord::from_document(
            "a.khan@univ.edu".to_string(),
            "https://univ.edu/files/handbook.pdf".to_string(),
        );
        assert_eq!(record.seniority, "unknown");
        assert_eq!(record.department, "General");
        assert!((record.confidence - 0.4).abs() < f64::EPSILON);
        assert_eq!(record.context_snippet, "From document");
    }
}
