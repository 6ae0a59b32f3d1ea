use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
}

/// Target site layout: where discovery starts and how seeds are paginated
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Start page listing the supported languages
    #[serde(rename = "start-page-url", default = "default_start_page_url")]
    pub start_page_url: String,

    /// Base URL under which `index_{language}.xml` sitemap indexes live
    #[serde(rename = "sitemap-base-url", default = "default_sitemap_base_url")]
    pub sitemap_base_url: String,

    /// Path markers; a sitemap URL containing any of them is a seed
    #[serde(rename = "seed-markers", default = "default_seed_markers")]
    pub seed_markers: Vec<String>,

    /// Query parameters sent with every page request (e.g. sort order)
    #[serde(rename = "fixed-params", default = "default_fixed_params")]
    pub fixed_params: BTreeMap<String, String>,

    /// Also archive the `__NEXT_DATA__` blob of every page
    #[serde(rename = "include-next-data", default)]
    pub include_next_data: bool,
}

impl SiteConfig {
    /// URL of the sitemap index for one language
    pub fn sitemap_index_url(&self, language_id: &str) -> String {
        format!(
            "{}/index_{}.xml",
            self.sitemap_base_url.trim_end_matches('/'),
            language_id
        )
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            start_page_url: default_start_page_url(),
            sitemap_base_url: default_sitemap_base_url(),
            seed_markers: default_seed_markers(),
            fixed_params: default_fixed_params(),
            include_next_data: false,
        }
    }
}

/// Fetch pipeline settings: retry, timeout and the global request budget
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Total tries per request (first try included)
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed wait between tries (seconds)
    #[serde(rename = "retry-wait-secs", default = "default_retry_wait_secs")]
    pub retry_wait_secs: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests allowed in any sliding 60 second window; `0` disables the limiter
    #[serde(
        rename = "max-calls-per-minute",
        default = "default_max_calls_per_minute",
        deserialize_with = "deserialize_call_budget"
    )]
    pub max_calls_per_minute: Option<u32>,
}

impl FetchConfig {
    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_wait_secs: default_retry_wait_secs(),
            timeout_secs: default_timeout_secs(),
            max_calls_per_minute: default_max_calls_per_minute(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawling project
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address of the operator, also sent as the `From` header
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the per-language page archives
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Directory receiving the dated discovery checkpoints
    #[serde(rename = "checkpoint-dir", default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Directory for the per-day log file; stderr when absent
    #[serde(rename = "log-dir", default)]
    pub log_dir: Option<PathBuf>,
}

/// Bounds for a harvest run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlConfig {
    /// Number of (shuffled) seeds to crawl; all when absent
    #[serde(default)]
    pub limit: Option<usize>,

    /// Highest page number fetched for any one seed
    #[serde(rename = "max-pages-per-seed", default)]
    pub max_pages_per_seed: Option<u32>,
}

fn default_start_page_url() -> String {
    "https://www.trustpilot.com/".to_string()
}

fn default_sitemap_base_url() -> String {
    "https://sitemaps.trustpilot.com".to_string()
}

fn default_seed_markers() -> Vec<String> {
    vec!["/review/".to_string()]
}

fn default_fixed_params() -> BTreeMap<String, String> {
    BTreeMap::from([("sort".to_string(), "recency".to_string())])
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_wait_secs() -> u64 {
    1
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_calls_per_minute() -> Option<u32> {
    Some(60)
}

/// TOML has no null, so an explicit `0` stands for "unlimited"
fn deserialize_call_budget<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let calls = u32::deserialize(deserializer)?;
    Ok(Some(calls).filter(|&calls| calls > 0))
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("sitemap_infos")
}
