use serde::{Deserialize, Serialize};
use std::fmt;

/// A page or category addressed either by title or by page id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageRef {
    Title(String),
    Id(u64),
}

impl PageRef {
    pub fn title(title: impl Into<String>) -> Self {
        PageRef::Title(title.into())
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Title(title) => write!(f, "{}", title),
            PageRef::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// One entry of a `categorymembers` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMember {
    pub title: String,
    pub page_id: u64,
}

impl CategoryMember {
    pub fn new(title: impl Into<String>, page_id: u64) -> Self {
        Self {
            title: title.into(),
            page_id,
        }
    }
}

/// A fully fetched article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WikiPage {
    pub title: String,
    pub page_id: Option<u64>,
    pub url: String,
    pub content: String,
    pub summary: String,
    /// Category names without the `Category:` prefix.
    pub categories: Vec<String>,
    /// Linked article titles, in API order.
    pub links: Vec<String>,
}

/// A listing that failed while the graph was being built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlFailure {
    pub category: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub categories_expanded: usize,
    pub pages_added: usize,
    pub main_pages_found: usize,
    pub failures: Vec<CrawlFailure>,
}

impl CrawlStats {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn record_failure(&mut self, category: &str, error: String) {
        self.failures.push(CrawlFailure {
            category: category.to_string(),
            error,
        });
    }
}
