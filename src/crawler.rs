//! The frontier scheduler: bounded-concurrency crawl loop driving
//! fetch -> discover -> extract -> enqueue.

use crate::config::Config;
use crate::discover;
use crate::documents;
use crate::error::Result;
use crate::extract;
use crate::fetcher::ContentFetcher;
use crate::models::{ContactRecord, CrawlSummary};
use crate::scope::TargetScope;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

/// Shared mutable crawl state. The visited/document sets and the record
/// store are test-and-insert under their locks, so a URL is dispatched at
/// most once and the first writer of an email wins regardless of worker
/// interleaving.
struct CrawlState {
    frontier: Mutex<VecDeque<String>>,
    visited: Mutex<HashSet<String>>,
    documents: Mutex<HashSet<String>>,
    records: Mutex<HashMap<String, ContactRecord>>,
    pages: AtomicUsize,
}

impl CrawlState {
    fn new() -> Self {
        Self {
            frontier: Mutex::new(VecDeque::new()),
            visited: Mutex::new(HashSet::new()),
            documents: Mutex::new(HashSet::new()),
            records: Mutex::new(HashMap::new()),
            pages: AtomicUsize::new(0),
        }
    }

    /// Atomic test-and-insert into the visited set. True when the URL was
    /// not yet dispatched and is now claimed by the caller.
    async fn mark_visited(&self, url: &str) -> bool {
        self.visited.lock().await.insert(url.to_string())
    }

    /// Same at-most-once guarantee for document downloads.
    async fn mark_document(&self, url: &str) -> bool {
        self.documents.lock().await.insert(url.to_string())
    }

    /// First-writer-wins record merge; later sightings of an email never
    /// overwrite the stored record.
    async fn insert_record(&self, record: ContactRecord) {
        let mut records = self.records.lock().await;
        if !records.contains_key(&record.email) {
            tracing::info!(
                target: "crawler",
                "New record: {} ({}, {}, confidence {:.2})",
                record.email,
                record.seniority,
                record.department,
                record.confidence
            );
            records.insert(record.email.clone(), record);
        }
    }

    /// Appends frontier candidates that have not been dispatched yet.
    async fn enqueue_unvisited(&self, urls: Vec<String>) {
        let visited = self.visited.lock().await;
        let mut frontier = self.frontier.lock().await;
        for url in urls {
            if !visited.contains(&url) {
                frontier.push_back(url);
            }
        }
    }

    fn pages_dispatched(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }
}

/// Builds the initial frontier: root URL, subdomain seeds, then guessed
/// sensitive paths under the root.
pub(crate) fn seed_urls(
    scope: &TargetScope,
    config: &Config,
    subdomains: Vec<String>,
) -> Vec<String> {
    let mut seeds = vec![scope.root_url.to_string()];
    seeds.extend(subdomains);
    for path in &config.sensitive_paths {
        match scope.root_url.join(path) {
            Ok(url) => seeds.push(url.to_string()),
            Err(e) => {
                tracing::warn!(target: "crawler", "Failed to join root with {}: {}", path, e);
            }
        }
    }
    seeds
}

/// The crawl engine. One instance per run.
pub(crate) struct Crawler {
    config: Arc<Config>,
    scope: Arc<TargetScope>,
    fetcher: Arc<ContentFetcher>,
    state: Arc<CrawlState>,
}

/// Everything a spawned worker needs, cheap to clone into the task.
#[derive(Clone)]
struct WorkerContext {
    config: Arc<Config>,
    scope: Arc<TargetScope>,
    fetcher: Arc<ContentFetcher>,
    state: Arc<CrawlState>,
}

impl Crawler {
    pub(crate) fn new(
        config: Arc<Config>,
        scope: TargetScope,
        fetcher: Arc<ContentFetcher>,
    ) -> Self {
        Self {
            config,
            scope: Arc::new(scope),
            fetcher,
            state: Arc::new(CrawlState::new()),
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.state.pages_dispatched() >= self.config.max_pages
    }

    /// Runs the crawl to completion: the frontier drains with no in-flight
    /// work remaining, or the page ceiling is reached and in-flight workers
    /// drain.
    pub(crate) async fn run(&self, seeds: Vec<String>) -> Result<CrawlSummary> {
        tracing::info!(
            target: "crawler",
            "Starting crawl of {} ({} seeds, {} workers, page ceiling {})",
            self.scope.base_domain,
            seeds.len(),
            self.config.max_concurrency,
            self.config.max_pages
        );

        self.state.frontier.lock().await.extend(seeds);

        let progress = ProgressBar::new(self.config.max_pages as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            // Launch while capacity, budget and frontier work remain.
            while workers.len() < self.config.max_concurrency && !self.budget_exhausted() {
                let next = { self.state.frontier.lock().await.pop_front() };
                let Some(url) = next else { break };
                if !self.state.mark_visited(&url).await {
                    continue;
                }

                self.state.pages.fetch_add(1, Ordering::SeqCst);
                progress.inc(1);
                progress.set_message(url.clone());

                let context = WorkerContext {
                    config: self.config.clone(),
                    scope: self.scope.clone(),
                    fetcher: self.fetcher.clone(),
                    state: self.state.clone(),
                };
                workers.spawn(async move { context.process_page(url).await });
            }

            match workers.join_next().await {
                Some(result) => {
                    if let Err(e) = result {
                        tracing::error!(target: "crawler", "Worker task failed: {}", e);
                    }
                }
                None => {
                    // No in-flight work. Stop once the frontier has drained
                    // or the page budget is spent.
                    let frontier_empty = self.state.frontier.lock().await.is_empty();
                    if frontier_empty || self.budget_exhausted() {
                        break;
                    }
                }
            }
        }

        progress.finish_and_clear();

        let summary = CrawlSummary {
            total_records: self.state.records.lock().await.len(),
            pages_fetched: self.state.pages_dispatched(),
            documents_seen: self.state.documents.lock().await.len(),
        };
        tracing::info!(
            target: "crawler",
            "Crawl complete: {} records from {} pages ({} documents)",
            summary.total_records,
            summary.pages_fetched,
            summary.documents_seen
        );
        Ok(summary)
    }

    /// The final record store, sorted by email for stable output.
    pub(crate) async fn records(&self) -> Vec<ContactRecord> {
        let records = self.state.records.lock().await;
        let mut list: Vec<ContactRecord> = records.values().cloned().collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        list
    }
}

impl WorkerContext {
    /// End-to-end handling of one dispatched URL. Every failure is a soft
    /// skip: the worker contributes nothing and the crawl continues.
    async fn process_page(&self, url: String) {
        let (html, tier) = self.fetcher.fetch(&url).await;
        if html.trim().is_empty() {
            tracing::debug!(target: "crawler", "No content for {}", url);
            return;
        }
        tracing::debug!(
            target: "crawler",
            "Fetched {} via {:?} ({} bytes)",
            url,
            tier,
            html.len()
        );

        let origin = match Url::parse(&url) {
            Ok(origin) => origin,
            Err(e) => {
                tracing::warn!(target: "crawler", "Unparseable origin URL {}: {}", url, e);
                return;
            }
        };

        let text = extract::page_text(&html);
        for email in extract::extract_emails(&html, &text, &self.scope) {
            let record = extract::classify_record(&text, &email, &url, &self.config);
            self.state.insert_record(record).await;
        }

        let discovered = discover::discover_links(&html, &origin, &self.scope, &self.config);

        for doc_url in &discovered.documents {
            if self.state.mark_document(doc_url).await {
                let records = documents::mine_document(
                    self.fetcher.http_client(),
                    doc_url,
                    &self.scope,
                    &self.config,
                )
                .await;
                for record in records {
                    self.state.insert_record(record).await;
                }
            }
        }

        // Politeness delay before feeding the frontier keeps request
        // patterns from bursting.
        tokio::time::sleep(self.config.random_sleep_duration()).await;
        self.state.enqueue_unvisited(discovered.pages).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(max_pages: usize, concurrency: usize) -> Arc<Config> {
        Arc::new(Config {
            browser_fallback: false,
            subdomain_discovery: false,
            sleep_between_requests: (0.0, 0.005),
            request_timeout: std::time::Duration::from_secs(2),
            max_pages,
            max_concurrency: concurrency,
            ..Config::default()
        })
    }

    async fn mount_page(server: &MockServer, page_path: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(page_path.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    // wiremock listens on 127.0.0.1. Overriding the base domain scopes which
    // email addresses count as in-scope; since the server's host then falls
    // outside the scope, such tests must seed every page URL directly.
    fn crawler_scoped(
        server: &MockServer,
        config: Arc<Config>,
        email_domain: Option<&str>,
    ) -> Crawler {
        let mut scope = TargetScope::from_root_url(&server.uri()).unwrap();
        if let Some(domain) = email_domain {
            scope.base_domain = domain.to_string();
        }
        let fetcher = Arc::new(ContentFetcher::new(config.clone()).unwrap());
        Crawler::new(config, scope, fetcher)
    }

    fn crawler_for(server: &MockServer, config: Arc<Config>) -> Crawler {
        crawler_scoped(server, config, None)
    }

    #[tokio::test]
    async fn test_duplicate_discoveries_fetched_once() {
        let server = MockServer::start().await;
        let base = server.uri();

        // Both children link back to the root and to each other.
        mount_page(
            &server,
            "/",
            r#"<a href="/a">a</a><a href="/a">a again</a><a href="/b">b</a>"#.to_string(),
        )
        .await;
        mount_page(
            &server,
            "/a",
            format!(r#"<a href="{base}/">root</a><a href="/b">b</a>"#),
        )
        .await;
        mount_page(
            &server,
            "/b",
            format!(r#"<a href="{base}/">root</a><a href="/a">a</a>"#),
        )
        .await;

        let crawler = crawler_for(&server, test_config(50, 8));
        let summary = crawler.run(vec![format!("{base}/")]).await.unwrap();

        assert_eq!(summary.pages_fetched, 3);

        let requests = server.received_requests().await.unwrap();
        let fetches_of_a = requests
            .iter()
            .filter(|r| r.url.path() == "/a")
            .count();
        assert_eq!(fetches_of_a, 1, "duplicate discovery must not refetch");
    }

    #[tokio::test]
    async fn test_page_ceiling_terminates_large_graph() {
        let server = MockServer::start().await;
        let base = server.uri();

        // Every page links onward, so the graph never drains on its own.
        let mut root_links = String::new();
        for i in 0..40 {
            root_links.push_str(&format!(r#"<a href="/page{i}">p</a>"#));
        }
        mount_page(&server, "/", root_links).await;
        for i in 0..40 {
            mount_page(
                &server,
                &format!("/page{i}"),
                format!(r#"<a href="/page{}">next</a>"#, i + 100),
            )
            .await;
        }
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(r#"<a href="/">loop</a>"#),
            )
            .mount(&server)
            .await;

        let crawler = crawler_for(&server, test_config(5, 4));
        let summary = crawler.run(vec![format!("{base}/")]).await.unwrap();

        assert_eq!(summary.pages_fetched, 5);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 5, "exactly the page budget may be spent");
    }

    #[tokio::test]
    async fn test_record_first_writer_wins() {
        let server = MockServer::start().await;
        let base = server.uri();
        let email = "jane.smith@univ.edu";

        mount_page(
            &server,
            "/rich",
            format!("<p>Professor Jane Smith, Computer Science, {email}</p>"),
        )
        .await;
        mount_page(&server, "/poor", format!("<p>{email}</p>")).await;

        // Concurrency 1 keeps FIFO order: /rich is classified first.
        let crawler = crawler_scoped(&server, test_config(10, 1), Some("univ.edu"));
        let summary = crawler
            .run(vec![format!("{base}/rich"), format!("{base}/poor")])
            .await
            .unwrap();

        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.total_records, 1);
        let records = crawler.records().await;
        assert_eq!(records[0].email, email);
        assert_eq!(records[0].name, "Jane Smith");
        assert_eq!(records[0].seniority, "senior");
        assert_eq!(records[0].department, "Computer Science");
        assert!(records[0].source_url.ends_with("/rich"));
    }

    #[tokio::test]
    async fn test_document_links_routed_to_miner_not_frontier() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(
            &server,
            "/",
            r#"<a href="/files/handbook.pdf">handbook</a><a href="/about">about</a>"#.to_string(),
        )
        .await;
        mount_page(&server, "/about", "<p>About us</p>".to_string()).await;
        Mock::given(method("GET"))
            .and(path("/files/handbook.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crawler = crawler_for(&server, test_config(10, 2));
        let summary = crawler.run(vec![format!("{base}/")]).await.unwrap();

        // The pdf consumed a document slot, never a page slot.
        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.documents_seen, 1);
    }

    #[tokio::test]
    async fn test_fetch_failures_are_soft_skips() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/dead"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_page(
            &server,
            "/alive",
            "<p>contact: info.desk@univ.edu</p>".to_string(),
        )
        .await;

        let crawler = crawler_scoped(&server, test_config(10, 2), Some("univ.edu"));
        let summary = crawler
            .run(vec![format!("{base}/dead"), format!("{base}/alive")])
            .await
            .unwrap();

        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.total_records, 1);
    }

    #[tokio::test]
    async fn test_seed_urls_include_root_subdomains_and_paths() {
        let scope = TargetScope::from_root_url("https://univ.edu").unwrap();
        let config = Config::default();
        let seeds = seed_urls(
            &scope,
            &config,
            vec!["https://cs.univ.edu".to_string()],
        );
        assert_eq!(seeds[0], "https://univ.edu/");
        assert!(seeds.contains(&"https://cs.univ.edu".to_string()));
        assert!(seeds.contains(&"https://univ.edu/staff".to_string()));
        assert!(seeds.contains(&"https://univ.edu/contact".to_string()));
    }
}
