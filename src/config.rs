//! Defines the configuration settings for the email-harvester application.

use anyhow::Context;
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments for email-harvester
#[derive(Parser, Debug)]
#[command(author, version, about = "A crawler that maps the contact surface of a target domain", long_about = None)]
pub(crate) struct AppArgs {
    /// Target root URL or bare domain (e.g. "univ.edu")
    pub target: String,

    /// Directory where reports are written
    #[arg(short, long, default_value = "recon_reports", env = "EMAIL_HARVESTER_OUTPUT")]
    pub output_dir: String,

    /// Path to configuration file (TOML format)
    #[arg(long, env = "EMAIL_HARVESTER_CONFIG")]
    pub config_file: Option<String>,

    /// Maximum number of concurrent fetch workers
    #[arg(short, long, env = "EMAIL_HARVESTER_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Maximum number of pages to fetch
    #[arg(long, env = "EMAIL_HARVESTER_MAX_PAGES")]
    pub max_pages: Option<usize>,

    /// Maximum number of subdomain seeds to enqueue
    #[arg(long, env = "EMAIL_HARVESTER_MAX_SUBDOMAINS")]
    pub max_subdomains: Option<usize>,

    /// Minimum politeness delay between requests (seconds)
    #[arg(long, env = "EMAIL_HARVESTER_MIN_SLEEP")]
    pub min_sleep: Option<f32>,

    /// Maximum politeness delay between requests (seconds)
    #[arg(long, env = "EMAIL_HARVESTER_MAX_SLEEP")]
    pub max_sleep: Option<f32>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "EMAIL_HARVESTER_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Browser navigation timeout in seconds
    #[arg(long, env = "EMAIL_HARVESTER_NAVIGATION_TIMEOUT")]
    pub navigation_timeout: Option<u64>,

    /// Disable the headless-browser fallback fetch path
    #[arg(long, default_value = "false", env = "EMAIL_HARVESTER_NO_BROWSER")]
    pub no_browser: bool,

    /// Skip the certificate-transparency subdomain lookup
    #[arg(long, default_value = "false", env = "EMAIL_HARVESTER_NO_SUBDOMAIN_DISCOVERY")]
    pub no_subdomain_discovery: bool,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    network: Option<NetworkConfig>,
    crawl: Option<CrawlConfig>,
    classifier: Option<ClassifierConfig>,
    output: Option<OutputConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct NetworkConfig {
    request_timeout: Option<u64>,
    navigation_timeout: Option<u64>,
    min_sleep: Option<f32>,
    max_sleep: Option<f32>,
    user_agents: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct CrawlConfig {
    max_pages: Option<usize>,
    max_subdomains: Option<usize>,
    max_concurrency: Option<usize>,
    sensitive_paths: Option<Vec<String>>,
    common_subdomains: Option<Vec<String>>,
    browser_fallback: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct ClassifierConfig {
    seniority_keywords: Option<Vec<KeywordGroup>>,
    department_keywords: Option<Vec<KeywordGroup>>,
}

#[derive(Deserialize, Debug)]
struct KeywordGroup {
    label: String,
    keywords: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct OutputConfig {
    output_dir: Option<String>,
}

/// A lenient email pattern shared by page extraction and document mining.
pub(crate) static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")
        .expect("Failed to compile email regex pattern. This should not happen.")
});

/// Application configuration settings.
///
/// Built once at startup and passed explicitly (`Arc<Config>`) into the
/// scheduler, fetcher and pipeline constructors.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Target root URL or bare domain supplied on the command line.
    pub target: String,
    /// Directory under which the per-run report directory is created.
    pub output_dir: String,
    /// Maximum number of concurrently running fetch workers.
    pub max_concurrency: usize,
    /// Ceiling on fetch attempts that count against the page budget.
    pub max_pages: usize,
    /// Cap on subdomain seeds (guessed + discovered).
    pub max_subdomains: usize,
    /// Minimum and maximum politeness delay between requests (seconds).
    pub sleep_between_requests: (f32, f32),
    /// Timeout for individual HTTP requests.
    pub request_timeout: Duration,
    /// Timeout for headless-browser navigation.
    pub navigation_timeout: Duration,
    /// Whether the heavy rendering path may be used when the fast path fails.
    pub browser_fallback: bool,
    /// Whether to query certificate transparency for subdomain seeds.
    pub subdomain_discovery: bool,
    /// Desktop user agents the fetcher picks from at random.
    pub user_agents: Vec<String>,
    /// Paths under the root URL that are seeded without being discovered.
    pub sensitive_paths: Vec<String>,
    /// Subdomain labels guessed without certificate-transparency help.
    pub common_subdomains: Vec<String>,
    /// Document extensions routed to the document miner (lowercase, with dot).
    pub document_extensions: Vec<String>,
    /// Ordered seniority tiers and their keyword sets. Order is the
    /// tie-breaking contract for classification.
    pub seniority_keywords: Vec<(String, Vec<String>)>,
    /// Ordered department taxonomy and keyword sets. Same ordering contract.
    pub department_keywords: Vec<(String, Vec<String>)>,
}

impl Default for Config {
    fn default() -> Self {
        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        ];

        let sensitive_paths = vec![
            "/staff",
            "/faculty",
            "/people",
            "/directory",
            "/contact",
            "/about",
            "/team",
            "/researchers",
            "/students",
            "/alumni",
        ];

        let common_subdomains = vec![
            "www",
            "mail",
            "webmail",
            "staff",
            "faculty",
            "cs",
            "it",
            "eee",
            "me",
            "ce",
            "admissions",
            "students",
            "library",
            "research",
            "alumni",
            "contact",
            "portal",
            "admin",
            "hr",
            "finance",
            "registrar",
        ];

        let seniority_keywords = vec![
            (
                "executive",
                vec!["director", "head", "dean", "chair", "provost", "vp", "vice president"],
            ),
            (
                "senior",
                vec!["professor", "principal", "lead", "chief", "manager", "coordinator"],
            ),
            (
                "mid",
                vec!["lecturer", "engineer", "specialist", "officer", "analyst"],
            ),
            (
                "junior",
                vec!["assistant", "trainee", "intern", "student", "researcher"],
            ),
        ];

        let department_keywords = vec![
            (
                "Computer Science",
                vec!["cs", "computer", "software", "ai", "data", "it"],
            ),
            (
                "Electrical Engineering",
                vec!["eee", "electrical", "electronics", "power", "telecom"],
            ),
            (
                "Mechanical",
                vec!["me", "mechanical", "thermal", "automotive", "robotics"],
            ),
            (
                "Civil",
                vec!["ce", "civil", "construction", "structural", "environmental"],
            ),
            (
                "Admin",
                vec!["admission", "registrar", "finance", "hr", "library", "accounts"],
            ),
        ];

        let owned =
            |groups: Vec<(&str, Vec<&str>)>| -> Vec<(String, Vec<String>)> {
                groups
                    .into_iter()
                    .map(|(label, kws)| {
                        (
                            label.to_string(),
                            kws.into_iter().map(|k| k.to_string()).collect(),
                        )
                    })
                    .collect()
            };

        Config {
            target: String::new(),
            output_dir: "recon_reports".to_string(),
            max_concurrency: 20,
            max_pages: 800,
            max_subdomains: 20,
            sleep_between_requests: (0.3, 1.2),
            request_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(15),
            browser_fallback: true,
            subdomain_discovery: true,
            user_agents: user_agents.iter().map(|s| s.to_string()).collect(),
            sensitive_paths: sensitive_paths.iter().map(|s| s.to_string()).collect(),
            common_subdomains: common_subdomains.iter().map(|s| s.to_string()).collect(),
            document_extensions: vec![".pdf", ".doc", ".docx", ".ppt", ".pptx"]
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
            seniority_keywords: owned(seniority_keywords),
            department_keywords: owned(department_keywords),
        }
    }
}

impl Config {
    /// Picks a random desktop user agent string.
    pub(crate) fn random_user_agent(&self) -> &str {
        use rand::seq::SliceRandom;
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(|s| s.as_str())
            .unwrap_or("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
    }

    /// Randomized politeness delay drawn from the configured bounds.
    pub(crate) fn random_sleep_duration(&self) -> Duration {
        use rand::Rng;
        let (min, max) = self.sleep_between_requests;
        if min >= max {
            return Duration::from_secs_f32(min);
        }
        Duration::from_secs_f32(rand::thread_rng().gen_range(min..max))
    }
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(network) = &file_config.network {
        if let Some(timeout) = network.request_timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(timeout) = network.navigation_timeout {
            config.navigation_timeout = Duration::from_secs(timeout);
        }
        if let Some(min_sleep) = network.min_sleep {
            config.sleep_between_requests.0 = min_sleep;
        }
        if let Some(max_sleep) = network.max_sleep {
            config.sleep_between_requests.1 = max_sleep;
        }
        if let Some(agents) = &network.user_agents {
            config.user_agents = agents.clone();
        }
    }

    if let Some(crawl) = &file_config.crawl {
        if let Some(max_pages) = crawl.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(max_subdomains) = crawl.max_subdomains {
            config.max_subdomains = max_subdomains;
        }
        if let Some(concurrency) = crawl.max_concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(paths) = &crawl.sensitive_paths {
            config.sensitive_paths = paths.clone();
        }
        if let Some(subs) = &crawl.common_subdomains {
            config.common_subdomains = subs.clone();
        }
        if let Some(fallback) = crawl.browser_fallback {
            config.browser_fallback = fallback;
        }
    }

    if let Some(classifier) = &file_config.classifier {
        if let Some(groups) = &classifier.seniority_keywords {
            config.seniority_keywords = groups
                .iter()
                .map(|g| (g.label.clone(), g.keywords.clone()))
                .collect();
        }
        if let Some(groups) = &classifier.department_keywords {
            config.department_keywords = groups
                .iter()
                .map(|g| (g.label.clone(), g.keywords.clone()))
                .collect();
        }
    }

    if let Some(output) = &file_config.output {
        if let Some(dir) = &output.output_dir {
            config.output_dir = dir.clone();
        }
    }
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &AppArgs) {
    config.target = args.target.clone();
    config.output_dir = args.output_dir.clone();

    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(max_subdomains) = args.max_subdomains {
        config.max_subdomains = max_subdomains;
    }
    if let Some(min_sleep) = args.min_sleep {
        config.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = args.max_sleep {
        config.sleep_between_requests.1 = max_sleep;
    }
    if let Some(timeout) = args.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(timeout) = args.navigation_timeout {
        config.navigation_timeout = Duration::from_secs(timeout);
    }
    if args.no_browser {
        config.browser_fallback = false;
    }
    if args.no_subdomain_discovery {
        config.subdomain_discovery = false;
    }
}

fn validate_config(config: &mut Config) -> anyhow::Result<()> {
    if config.target.trim().is_empty() {
        anyhow::bail!("Target URL must not be empty");
    }

    if config.sleep_between_requests.0 > config.sleep_between_requests.1 {
        config.sleep_between_requests.1 = config.sleep_between_requests.0;
        tracing::warn!(
            "Min sleep was greater than max sleep. Setting both to {}",
            config.sleep_between_requests.0
        );
    }

    if config.max_concurrency == 0 {
        config.max_concurrency = 1;
        tracing::warn!("Concurrency was set to 0. Setting to 1.");
    }

    if config.max_pages == 0 {
        config.max_pages = 1;
        tracing::warn!("Page ceiling was set to 0. Setting to 1.");
    }

    if config.user_agents.is_empty() {
        config.user_agents = Config::default().user_agents;
        tracing::warn!("User agent list was empty. Restoring defaults.");
    }

    if config.seniority_keywords.is_empty() || config.department_keywords.is_empty() {
        let defaults = Config::default();
        if config.seniority_keywords.is_empty() {
            config.seniority_keywords = defaults.seniority_keywords;
        }
        if config.department_keywords.is_empty() {
            config.department_keywords = defaults.department_keywords;
        }
        tracing::warn!("Classifier keyword tables were empty. Restoring defaults.");
    }

    Ok(())
}

pub(crate) fn build_config() -> anyhow::Result<Arc<Config>> {
    let args = AppArgs::parse();

    let mut config = Config::default();

    if let Some(ref file_path) = args.config_file {
        match load_config_file(file_path) {
            Ok(file_config) => apply_file_config(&mut config, &file_config),
            Err(e) => {
                tracing::error!("Failed to load configuration file: {}", e);
            }
        }
    } else {
        for path in ["./email-harvester.toml", "./config.toml"].iter() {
            if Path::new(path).exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut config, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {}", path, e);
                    }
                }
            }
        }
    }

    apply_cli_args(&mut config, &args);

    validate_config(&mut config)?;

    tracing::debug!("Final configuration: {:?}", config);

    Ok(Arc::new(config))
}
