//! An in-memory wiki for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::WikiApi;
use crate::config::WikiConfig;
use crate::error::{Result, ScanError};
use crate::graph::category_title;
use crate::result::{CategoryMember, PageRef, WikiPage};

#[derive(Default)]
pub struct InMemoryWiki {
    config: WikiConfig,
    ids: HashMap<String, u64>,
    titles: HashMap<u64, String>,
    subcategories: HashMap<String, Vec<String>>,
    pages: HashMap<String, Vec<String>>,
    articles: HashMap<String, (Vec<String>, Vec<String>)>,
    rendered: HashMap<String, String>,
    ambiguous: HashSet<String>,
    failing: HashSet<String>,
    unavailable: HashSet<String>,
    requests: AtomicUsize,
    listing_log: Mutex<Vec<String>>,
}

impl InMemoryWiki {
    pub fn new(config: WikiConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn id_for(&mut self, title: &str) -> u64 {
        if let Some(&id) = self.ids.get(title) {
            return id;
        }
        let id = self.ids.len() as u64 + 1;
        self.ids.insert(title.to_string(), id);
        self.titles.insert(id, title.to_string());
        id
    }

    pub fn with_subcategories(mut self, category: &str, children: &[&str]) -> Self {
        let parent = category_title(category);
        self.id_for(&parent);
        let children: Vec<String> = children.iter().map(|c| category_title(c)).collect();
        for child in &children {
            self.id_for(child);
        }
        self.subcategories.entry(parent).or_default().extend(children);
        self
    }

    pub fn with_pages(mut self, category: &str, pages: &[&str]) -> Self {
        let parent = category_title(category);
        self.id_for(&parent);
        for page in pages {
            self.id_for(page);
        }
        self.pages
            .entry(parent)
            .or_default()
            .extend(pages.iter().map(|p| p.to_string()));
        self
    }

    /// An article with its categories (unprefixed) and outbound links.
    pub fn with_article(mut self, title: &str, categories: &[&str], links: &[&str]) -> Self {
        self.id_for(title);
        self.articles.insert(
            title.to_string(),
            (
                categories.iter().map(|c| c.to_string()).collect(),
                links.iter().map(|l| l.to_string()).collect(),
            ),
        );
        self
    }

    pub fn with_rendered(mut self, category: &str, html: &str) -> Self {
        let title = category_title(category);
        self.id_for(&title);
        self.rendered.insert(title, html.to_string());
        self
    }

    pub fn with_ambiguous(mut self, title: &str) -> Self {
        self.ambiguous.insert(title.to_string());
        self
    }

    /// Listings of this category fail with a 503.
    pub fn with_failing_listing(mut self, category: &str) -> Self {
        let title = category_title(category);
        self.id_for(&title);
        self.failing.insert(title);
        self
    }

    /// Page lookups of this title fail with a 503.
    pub fn with_unavailable_page(mut self, title: &str) -> Self {
        self.id_for(title);
        self.unavailable.insert(title.to_string());
        self
    }

    pub fn page_id(&self, title: &str) -> Option<u64> {
        self.ids.get(title).copied()
    }

    /// Categories whose subcategories were listed, in call order.
    pub fn listing_log(&self) -> Vec<String> {
        self.listing_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn title_of(&self, page: &PageRef) -> Result<String> {
        match page {
            PageRef::Title(title) => Ok(title.clone()),
            PageRef::Id(id) => self
                .titles
                .get(id)
                .cloned()
                .ok_or_else(|| ScanError::PageNotFound(page.to_string())),
        }
    }

    fn members(
        &self,
        category: &PageRef,
        table: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<CategoryMember>> {
        let title = category_title(&self.title_of(category)?);
        if self.failing.contains(&title) {
            return Err(ScanError::HttpStatus {
                status: 503,
                url: self.config.api_url.clone(),
            });
        }
        Ok(table
            .get(&title)
            .map(|children| {
                children
                    .iter()
                    .map(|c| CategoryMember::new(c.clone(), self.page_id(c).unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl WikiApi for InMemoryWiki {
    async fn list_subcategories(&self, category: &PageRef) -> Result<Vec<CategoryMember>> {
        self.count();
        if let Ok(mut log) = self.listing_log.lock() {
            log.push(category.to_string());
        }
        self.members(category, &self.subcategories)
    }

    async fn list_member_pages(&self, category: &PageRef) -> Result<Vec<CategoryMember>> {
        self.count();
        self.members(category, &self.pages)
    }

    async fn resolve_url_by_id(&self, page_id: u64) -> Result<String> {
        self.count();
        self.titles
            .get(&page_id)
            .map(|title| self.config.article_url(title))
            .ok_or_else(|| ScanError::PageNotFound(format!("page id {}", page_id)))
    }

    async fn resolve_url_by_title(&self, title: &str) -> Result<String> {
        self.count();
        self.page_id(title)
            .map(|_| self.config.article_url(title))
            .ok_or_else(|| ScanError::PageNotFound(title.to_string()))
    }

    async fn resolve_category_id_by_name(&self, title: &str) -> Result<u64> {
        self.count();
        self.page_id(&category_title(title))
            .ok_or_else(|| ScanError::PageNotFound(title.to_string()))
    }

    async fn fetch_rendered_content(&self, page_id: u64, window_chars: usize) -> Result<String> {
        self.count();
        let title = self.title_of(&PageRef::Id(page_id))?;
        Ok(self
            .rendered
            .get(&title)
            .map(|html| html.chars().take(window_chars).collect())
            .unwrap_or_default())
    }

    async fn fetch_page(&self, page: &PageRef) -> Result<WikiPage> {
        self.count();
        let title = self.title_of(page)?;
        if self.unavailable.contains(&title) {
            return Err(ScanError::HttpStatus {
                status: 503,
                url: self.config.api_url.clone(),
            });
        }
        if self.ambiguous.contains(&title) {
            return Err(ScanError::DisambiguationAmbiguous(title));
        }
        let (categories, links) = self
            .articles
            .get(&title)
            .ok_or_else(|| ScanError::PageNotFound(title.clone()))?;
        Ok(WikiPage {
            url: self.config.article_url(&title),
            page_id: self.page_id(&title),
            content: String::new(),
            summary: String::new(),
            categories: categories.clone(),
            links: links.clone(),
            title,
        })
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}
