//! Passive subdomain discovery: certificate-transparency lookup plus a fixed
//! guess list. Failures yield the guess list only, never an error.

use crate::config::Config;
use crate::scope::TargetScope;
use reqwest::Client;
use std::collections::HashSet;

/// Returns a bounded list of candidate seed URLs for subdomains of the
/// target, certificate-transparency results first, guesses after.
pub(crate) async fn discover_subdomains(
    client: &Client,
    scope: &TargetScope,
    config: &Config,
) -> Vec<String> {
    let mut candidates = Vec::new();

    if config.subdomain_discovery {
        candidates.extend(certificate_transparency_lookup(client, scope).await);
    }
    candidates.extend(guessed_subdomains(scope, config));

    let mut seen = HashSet::new();
    candidates.retain(|url| seen.insert(url.clone()));
    candidates.truncate(config.max_subdomains);
    candidates
}

/// Queries crt.sh for certificates issued under the base domain.
async fn certificate_transparency_lookup(client: &Client, scope: &TargetScope) -> Vec<String> {
    let lookup_url = format!("https://crt.sh/?q=%25.{}&output=json", scope.base_domain);
    tracing::debug!(target: "subdomains", "Querying certificate transparency: {}", lookup_url);

    let body = match client.get(&lookup_url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(target: "subdomains", "Failed to read crt.sh response: {}", e);
                return Vec::new();
            }
        },
        Ok(response) => {
            tracing::warn!(target: "subdomains", "crt.sh returned HTTP {}", response.status());
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(target: "subdomains", "crt.sh lookup failed: {}", e);
            return Vec::new();
        }
    };

    parse_crt_response(&body, scope)
}

/// Extracts in-scope hostnames from a crt.sh JSON response. Certificate
/// `name_value` entries may hold several newline-separated names and
/// wildcard entries are dropped.
fn parse_crt_response(body: &str, scope: &TargetScope) -> Vec<String> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(body) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(target: "subdomains", "Unparseable crt.sh response: {}", e);
            return Vec::new();
        }
    };

    let mut hosts: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for entry in &entries {
        let Some(name_value) = entry.get("name_value").and_then(|v| v.as_str()) else {
            continue;
        };
        for name in name_value.lines() {
            let host = name.trim().to_lowercase();
            if host.is_empty() || host.contains('*') || !scope.in_scope_host(&host) {
                continue;
            }
            if seen.insert(host.clone()) {
                hosts.push(format!("https://{}", host));
            }
        }
    }
    hosts
}

/// Fixed guess list mapped onto the base domain.
fn guessed_subdomains(scope: &TargetScope, config: &Config) -> Vec<String> {
    config
        .common_subdomains
        .iter()
        .map(|sub| format!("https://{}.{}", sub, scope.base_domain))
        .collect()
}
