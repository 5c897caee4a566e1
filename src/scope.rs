//! Domain scoping: decides which hosts and email addresses belong to the
//! target organization.

use crate::error::{AppError, Result};
use url::Url;

/// The immutable crawl target: root URL plus its normalized base domain.
///
/// The base domain is computed once at construction (lowercased, `www.`
/// prefix stripped) and never recomputed for the lifetime of the run.
#[derive(Debug, Clone)]
pub(crate) struct TargetScope {
    /// The starting URL of the crawl.
    pub root_url: Url,
    /// The normalized base domain, e.g. "example.edu".
    pub base_domain: String,
}

impl TargetScope {
    /// Builds a scope from the user-supplied root URL string.
    /// Handles missing schemes, "www." prefixes, and mixed case.
    ///
    /// # Returns
    /// * `Ok(TargetScope)` if a host could be extracted.
    /// * `Err(AppError::DomainExtraction)` if the input is empty or hostless.
    pub(crate) fn from_root_url(root_url_str: &str) -> Result<Self> {
        tracing::debug!("Building target scope from URL: {}", root_url_str);
        if root_url_str.trim().is_empty() {
            tracing::warn!("Received empty root URL for scope construction.");
            return Err(AppError::DomainExtraction(
                "Input URL string is empty".to_string(),
            ));
        }

        let trimmed = root_url_str.trim();
        let url_str_with_scheme =
            if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                format!("https://{}", trimmed)
            } else {
                trimmed.to_string()
            };

        let root_url = Url::parse(&url_str_with_scheme).map_err(|e| {
            tracing::error!(
                "Failed to parse root URL '{}' (original: {}): {}",
                url_str_with_scheme,
                root_url_str,
                e
            );
            AppError::UrlParse(e)
        })?;

        let host = root_url.host_str().ok_or_else(|| {
            AppError::DomainExtraction(format!(
                "Could not extract host from parsed URL: {}",
                url_str_with_scheme
            ))
        })?;

        let base_domain = host
            .strip_prefix("www.")
            .unwrap_or(host)
            .to_lowercase();

        tracing::debug!("Target scope base domain: '{}'", base_domain);
        Ok(Self {
            root_url,
            base_domain,
        })
    }

    /// Returns true iff `host` is the base domain or one of its subdomains.
    pub(crate) fn in_scope_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        host == self.base_domain || host.ends_with(&format!(".{}", self.base_domain))
    }

    /// Returns true iff the email's domain part is in scope.
    /// Malformed addresses without an `@` are simply out of scope.
    pub(crate) fn in_scope_email(&self, email: &str) -> bool {
        match email.rsplit_once('@') {
            Some((_local, domain)) => self.in_scope_host(domain),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_construction_normalizes_domain() {
        let scope = TargetScope::from_root_url("https://www.Example.EDU/").unwrap();
        assert_eq!(scope.base_domain, "example.edu");

        let scope = TargetScope::from_root_url("univ.edu").unwrap();
        assert_eq!(scope.base_domain, "univ.edu");
        assert_eq!(scope.root_url.as_str(), "https://univ.edu/");
    }

    #[test]
    fn test_scope_construction_invalid() {
        assert!(TargetScope::from_root_url("").is_err());
        assert!(TargetScope::from_root_url("http://").is_err());
        assert!(TargetScope::from_root_url("https://").is_err());
        assert!(TargetScope::from_root_url("   http://   ").is_err());
    }

    #[test]
    fn test_in_scope_host() {
        let scope = TargetScope::from_root_url("https://univ.edu").unwrap();
        assert!(scope.in_scope_host("univ.edu"));
        assert!(scope.in_scope_host("admin.univ.edu"));
        assert!(scope.in_scope_host("CS.UNIV.EDU"));
        assert!(!scope.in_scope_host("notuniv.edu"));
        assert!(!scope.in_scope_host("univ.edu.evil.com"));
    }

    #[test]
    fn test_in_scope_email() {
        let scope = TargetScope::from_root_url("https://univ.edu").unwrap();
        assert!(scope.in_scope_email("jane@univ.edu"));
        assert!(scope.in_scope_email("jane@cs.univ.edu"));
        assert!(!scope.in_scope_email("jane@gmail.com"));
        assert!(!scope.in_scope_email("not-an-email"));
    }
}
