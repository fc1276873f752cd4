use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::client::WikiApi;
use crate::config::WikiConfig;
use crate::error::{Result, ScanError};
use crate::graph::strip_category_prefix;
use crate::result::{PageRef, WikiPage};

/// Text that precedes the main-article link in a rendered category page
/// ("The main article for this category is <b><a href=...").
pub const MAIN_ARTICLE_MARKER: &str = "category</a> is <b>";

/// How much of the rendered category page is scanned for the marker.
pub const CONTENT_WINDOW: usize = 1000;

static HREF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("valid href pattern"));

/// The two ways a category's main article can be found. They can disagree
/// for ambiguous titles, so callers pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MainArticleStrategy {
    /// Fetch the article whose title is the category name without its prefix.
    #[default]
    ByTitle,
    /// Scan the rendered category page for the main-article hatnote.
    ByContentScan,
}

impl FromStr for MainArticleStrategy {
    type Err = ScanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" | "by-title" => Ok(MainArticleStrategy::ByTitle),
            "scan" | "content" | "by-content-scan" => Ok(MainArticleStrategy::ByContentScan),
            _ => Err(ScanError::InvalidOption {
                option: "main-article strategy",
                value: s.to_string(),
                expected: "title, scan or off",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainArticle {
    Found { url: String, title: Option<String> },
    /// The category designates no main article. Not an error.
    NotFound,
}

impl MainArticle {
    pub fn url(&self) -> Option<&str> {
        match self {
            MainArticle::Found { url, .. } => Some(url),
            MainArticle::NotFound => None,
        }
    }
}

pub struct MainArticleResolver<'a, A: WikiApi + ?Sized> {
    api: &'a A,
    config: &'a WikiConfig,
    marker: String,
    window_chars: usize,
}

impl<'a, A: WikiApi + ?Sized> MainArticleResolver<'a, A> {
    pub fn new(api: &'a A, config: &'a WikiConfig) -> Self {
        Self {
            api,
            config,
            marker: MAIN_ARTICLE_MARKER.to_string(),
            window_chars: CONTENT_WINDOW,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_window(mut self, window_chars: usize) -> Self {
        self.window_chars = window_chars;
        self
    }

    /// By-title lookup. `PageNotFound` and `DisambiguationAmbiguous` are
    /// returned to the caller. The page carries categories and links but no
    /// text extracts.
    pub async fn main_page(&self, title: &str) -> Result<WikiPage> {
        let article = strip_category_prefix(title);
        self.api.lookup_page(&PageRef::title(article)).await
    }

    /// By-content scan of the first `window_chars` of the category page.
    pub async fn scan(&self, category: &str, page_id: Option<u64>) -> Result<MainArticle> {
        let page_id = match page_id {
            Some(id) => id,
            None => self.api.resolve_category_id_by_name(category).await?,
        };
        let html = self
            .api
            .fetch_rendered_content(page_id, self.window_chars)
            .await?;

        match extract_main_article_href(&html, &self.marker) {
            Some(href) => Ok(MainArticle::Found {
                url: self.config.absolute_url(&href)?,
                title: None,
            }),
            None => Ok(MainArticle::NotFound),
        }
    }

    pub async fn resolve(
        &self,
        category: &str,
        page_id: Option<u64>,
        strategy: MainArticleStrategy,
    ) -> Result<MainArticle> {
        match strategy {
            MainArticleStrategy::ByTitle => {
                let page = self.main_page(category).await?;
                Ok(MainArticle::Found {
                    url: page.url,
                    title: Some(page.title),
                })
            }
            MainArticleStrategy::ByContentScan => self.scan(category, page_id).await,
        }
    }
}

/// The first quoted href after `marker`, if the marker occurs at all.
pub fn extract_main_article_href(html: &str, marker: &str) -> Option<String> {
    let start = html.find(marker)? + marker.len();
    HREF_PATTERN
        .captures(&html[start..])
        .map(|caps| caps[1].to_string())
}
