//! Link and document discovery over raw fetched HTML.
//!
//! Deliberately regex-based rather than a full HTML parse so that malformed
//! markup still yields its links.

use crate::config::Config;
use crate::scope::TargetScope;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static HREF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href\s*=\s*['"]?([^'"<> ]+)"#).unwrap());

/// Same-domain URLs found on a page, routed into exactly one of two sets.
#[derive(Debug, Default)]
pub(crate) struct DiscoveredLinks {
    /// In-scope page URLs proposed as new frontier candidates.
    pub pages: Vec<String>,
    /// In-scope document URLs proposed for the document miner.
    pub documents: Vec<String>,
}

/// Extracts every `href`-like value from `html`, resolves it against
/// `origin`, filters through the domain scope, and routes document
/// extensions away from the page frontier.
///
/// Absolute `http(s)` links are used as-is and root-relative links are
/// resolved against the originating URL; fragments, `mailto:` links and bare
/// relative paths are ignored.
pub(crate) fn discover_links(
    html: &str,
    origin: &Url,
    scope: &TargetScope,
    config: &Config,
) -> DiscoveredLinks {
    let mut discovered = DiscoveredLinks::default();
    let mut seen: HashSet<String> = HashSet::new();

    for capture in HREF_REGEX.captures_iter(html) {
        let raw = &capture[1];

        let resolved = if raw.starts_with("http://") || raw.starts_with("https://") {
            Url::parse(raw).ok()
        } else if raw.starts_with('/') {
            origin.join(raw).ok()
        } else {
            None
        };

        let Some(mut url) = resolved else { continue };
        url.set_fragment(None);

        let Some(host) = url.host_str() else { continue };
        if !scope.in_scope_host(host) {
            continue;
        }

        let url_string = url.to_string();
        if !seen.insert(url_string.clone()) {
            continue;
        }

        if is_document_url(&url, config) {
            tracing::debug!(target: "discover", "Document candidate: {}", url_string);
            discovered.documents.push(url_string);
        } else {
            discovered.pages.push(url_string);
        }
    }

    discovered
}

/// True when the URL path ends in one of the configured document extensions.
pub(crate) fn is_document_url(url: &Url, config: &Config) -> bool {
    let path = url.path().to_lowercase();
    config
        .document_extensions
        .iter()
        .any(|ext| path.ends_with(ext.as_str()))
}
