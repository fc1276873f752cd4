use std::env;

use url::Url;

use crate::error::{Result, ScanError};

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_SITE_URL: &str = "https://en.wikipedia.org";
pub const DEFAULT_ARTICLE_PATH: &str = "/wiki/";
pub const DEFAULT_USER_AGENT: &str = "catbridge/0.1 (category portal cross-referencing)";

/// Connection and pacing settings for a MediaWiki site.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub api_url: String,
    pub site_url: String,
    pub article_path: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub member_page_size: usize,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            article_path: DEFAULT_ARTICLE_PATH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
            concurrency: 4,
            max_retries: 2,
            retry_delay_ms: 500,
            member_page_size: 500,
        }
    }
}

impl WikiConfig {
    /// Defaults overlaid with `CATBRIDGE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_value("CATBRIDGE_API_URL", &defaults.api_url),
            site_url: env_value("CATBRIDGE_SITE_URL", &defaults.site_url),
            article_path: defaults.article_path,
            user_agent: env_value("CATBRIDGE_USER_AGENT", &defaults.user_agent),
            timeout_ms: env_value_u64("CATBRIDGE_HTTP_TIMEOUT_MS", defaults.timeout_ms),
            concurrency: env_value_usize("CATBRIDGE_CONCURRENCY", defaults.concurrency),
            max_retries: env_value_usize("CATBRIDGE_HTTP_RETRIES", defaults.max_retries),
            retry_delay_ms: env_value_u64("CATBRIDGE_HTTP_RETRY_DELAY_MS", defaults.retry_delay_ms),
            member_page_size: defaults.member_page_size,
        }
    }

    /// Points both the API and the article links at one host, e.g. a mock server.
    pub fn for_site(site_url: &str) -> Self {
        let site = site_url.trim_end_matches('/');
        Self {
            api_url: format!("{}/w/api.php", site),
            site_url: site.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .map_err(|e| ScanError::InvalidUrl(format!("api url {}: {}", self.api_url, e)))?;
        Url::parse(&self.site_url)
            .map_err(|e| ScanError::InvalidUrl(format!("site url {}: {}", self.site_url, e)))?;
        Ok(())
    }

    /// Deterministic article URL for a title: spaces become underscores.
    pub fn article_url(&self, title: &str) -> String {
        format!(
            "{}{}{}",
            self.site_url.trim_end_matches('/'),
            self.article_path,
            title.replace(' ', "_")
        )
    }

    /// Resolves an href found in rendered HTML against the site root.
    pub fn absolute_url(&self, href: &str) -> Result<String> {
        let base = Url::parse(&self.site_url)
            .map_err(|e| ScanError::InvalidUrl(format!("site url {}: {}", self.site_url, e)))?;
        base.join(href)
            .map(|u| u.to_string())
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", href, e)))
    }
}

fn env_value(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}
