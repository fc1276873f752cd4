use futures::stream::{self, StreamExt};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::WikiApi;
use crate::config::WikiConfig;
use crate::error::{Result, ScanError};
use crate::graph::{CategoryGraph, GraphNode, NodeIdentity, NodeKind, category_title};
use crate::main_article::{MainArticle, MainArticleResolver, MainArticleStrategy};
use crate::result::{CategoryMember, CrawlStats, PageRef};

/// Called with `(level, category title)` as each category is expanded.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// One pending category expansion.
#[derive(Debug, Clone)]
struct CrawlTask {
    title: String,
    page_id: Option<u64>,
    remaining_depth: usize,
    parent: NodeIndex,
}

/// What a single expansion fetched; merged into the graph by one writer.
struct Expansion {
    task: CrawlTask,
    url: String,
    pages: Vec<(CategoryMember, String)>,
    subcategories: Vec<CategoryMember>,
    main_article: Option<String>,
    failures: Vec<String>,
}

/// Builds a category graph by expanding subcategories level by level up to a
/// depth bound. Cycles in the wiki's category structure are absorbed by node
/// de-duplication; the depth bound alone guarantees termination.
pub struct CategoryCrawler<A: WikiApi + ?Sized> {
    api: Arc<A>,
    config: WikiConfig,
    graph: CategoryGraph,
    stats: CrawlStats,
    include_pages: bool,
    identity: NodeIdentity,
    main_article: Option<MainArticleStrategy>,
    concurrency: usize,
    deadline: Option<Duration>,
    progress_callback: Option<ProgressCallback>,
}

impl<A: WikiApi + ?Sized> CategoryCrawler<A> {
    pub fn new(api: Arc<A>, config: WikiConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            api,
            config,
            graph: CategoryGraph::new(),
            stats: CrawlStats::default(),
            include_pages: false,
            identity: NodeIdentity::Url,
            main_article: Some(MainArticleStrategy::ByTitle),
            concurrency,
            deadline: None,
            progress_callback: None,
        }
    }

    pub fn with_pages(mut self, include_pages: bool) -> Self {
        self.include_pages = include_pages;
        self
    }

    pub fn with_identity(mut self, identity: NodeIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Strategy for the best-effort main-article lookup; `None` disables it.
    pub fn with_main_article(mut self, strategy: Option<MainArticleStrategy>) -> Self {
        self.main_article = strategy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn graph(&self) -> &CategoryGraph {
        &self.graph
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn into_parts(self) -> (CategoryGraph, CrawlStats) {
        (self.graph, self.stats)
    }

    /// Crawls `portal` below the root sentinel, expanding `subcategory_depth`
    /// levels of subcategories.
    pub async fn explore(&mut self, portal: &str, subcategory_depth: usize) -> Result<()> {
        info!(
            "Exploring {} (depth {}, pages: {})",
            portal, subcategory_depth, self.include_pages
        );
        let root = self.graph.root();
        match self.deadline {
            Some(limit) => tokio::time::timeout(
                limit,
                self.explore_and_store(portal, None, subcategory_depth, root),
            )
            .await
            .map_err(|_| ScanError::CrawlIncomplete {
                portal: portal.to_string(),
                elapsed: limit,
            }),
            None => {
                self.explore_and_store(portal, None, subcategory_depth, root)
                    .await;
                Ok(())
            }
        }
    }

    /// Adds `category` under `parent` and expands it. Listing failures are
    /// recorded in the stats and do not stop sibling expansions.
    pub async fn explore_and_store(
        &mut self,
        category: &str,
        page_id: Option<u64>,
        remaining_depth: usize,
        parent: NodeIndex,
    ) {
        let mut level = vec![CrawlTask {
            title: category_title(category),
            page_id,
            remaining_depth,
            parent,
        }];
        let mut depth = 0;

        while !level.is_empty() {
            debug!("Expanding {} categories at level {}", level.len(), depth);
            let expansions: Vec<Expansion> = {
                let this = &*self;
                stream::iter(level)
                    .map(move |task| this.expand(task, depth))
                    .buffered(this.concurrency)
                    .collect()
                    .await
            };

            level = Vec::new();
            for expansion in expansions {
                level.extend(self.merge(expansion));
            }
            depth += 1;
        }

        if self.stats.is_partial() {
            warn!(
                "Graph is partial: {} listing(s) failed",
                self.stats.failures.len()
            );
        }
    }

    async fn expand(&self, task: CrawlTask, depth: usize) -> Expansion {
        if let Some(ref callback) = self.progress_callback {
            callback(depth, task.title.clone());
        }

        // Category URLs come from the API so a portal reached again through a
        // cycle carries the same encoded URL as when it was listed.
        let url = match task.page_id {
            None => self.api.resolve_url_by_title(&task.title).await,
            Some(id) => self.api.resolve_url_by_id(id).await,
        };
        let url = url.unwrap_or_else(|e| {
            warn!("URL lookup for {} failed ({}), using article path", task.title, e);
            self.config.article_url(&task.title)
        });
        info!(depth, "{} URL: {}", task.title, url);

        let category = PageRef::title(task.title.clone());
        let mut failures = Vec::new();

        let mut pages = Vec::new();
        if self.include_pages {
            match self.api.list_member_pages(&category).await {
                Ok(members) => pages = self.with_page_urls(members).await,
                Err(e) => {
                    warn!("Listing pages of {} failed: {}", task.title, e);
                    failures.push(format!("member pages: {}", e));
                }
            }
        }

        let mut subcategories = Vec::new();
        if task.remaining_depth > 0 {
            match self.api.list_subcategories(&category).await {
                Ok(members) => subcategories = members,
                Err(e) => {
                    warn!("Listing subcategories of {} failed: {}", task.title, e);
                    failures.push(format!("subcategories: {}", e));
                }
            }
        }

        let main_article = match self.main_article {
            Some(strategy) => self.lookup_main_article(&task, strategy).await,
            None => None,
        };

        Expansion {
            task,
            url,
            pages,
            subcategories,
            main_article,
            failures,
        }
    }

    async fn with_page_urls(&self, members: Vec<CategoryMember>) -> Vec<(CategoryMember, String)> {
        let ids: Vec<u64> = members.iter().map(|m| m.page_id).collect();
        let urls = match self.api.resolve_urls_by_ids(&ids).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!("URL lookup for {} pages failed: {}", ids.len(), e);
                HashMap::new()
            }
        };
        members
            .into_iter()
            .map(|member| {
                let url = urls
                    .get(&member.page_id)
                    .cloned()
                    .unwrap_or_else(|| self.config.article_url(&member.title));
                (member, url)
            })
            .collect()
    }

    /// Best effort: every failure here is logged and swallowed.
    async fn lookup_main_article(
        &self,
        task: &CrawlTask,
        strategy: MainArticleStrategy,
    ) -> Option<String> {
        let resolver = MainArticleResolver::new(self.api.as_ref(), &self.config);
        match resolver.resolve(&task.title, task.page_id, strategy).await {
            Ok(MainArticle::Found { url, title }) => {
                info!(
                    "Main Wiki page: {} ({})",
                    title.as_deref().unwrap_or("untitled"),
                    url
                );
                Some(url)
            }
            Ok(MainArticle::NotFound) => {
                debug!("No main page for {}", task.title);
                None
            }
            Err(e) => {
                debug!("Main page for {} unavailable: {}", task.title, e);
                None
            }
        }
    }

    fn merge(&mut self, expansion: Expansion) -> Vec<CrawlTask> {
        let Expansion {
            task,
            url,
            pages,
            subcategories,
            main_article,
            failures,
        } = expansion;

        let node = GraphNode::new(
            NodeKind::Category,
            self.identity,
            &task.title,
            &url,
            task.page_id,
        );
        let idx = self.graph.upsert(node);
        self.graph.add_edge(task.parent, idx);
        self.stats.categories_expanded += 1;

        if let Some(main_url) = main_article {
            self.graph.set_main_article(idx, main_url);
            self.stats.main_pages_found += 1;
        }

        for (member, page_url) in pages {
            let before = self.graph.node_count();
            let page = GraphNode::new(
                NodeKind::Page,
                self.identity,
                &member.title,
                &page_url,
                Some(member.page_id),
            );
            let page_idx = self.graph.upsert(page);
            self.graph.add_edge(idx, page_idx);
            if self.graph.node_count() > before {
                self.stats.pages_added += 1;
            }
        }

        for failure in failures {
            self.stats.record_failure(&task.title, failure);
        }

        subcategories
            .into_iter()
            .map(|sub| CrawlTask {
                title: sub.title,
                page_id: Some(sub.page_id),
                remaining_depth: task.remaining_depth.saturating_sub(1),
                parent: idx,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WikiClient;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    /// Crawl a two-level category tree served over HTTP
    #[tokio::test]
    async fn test_crawl_over_http() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("cmtype", "subcat"))
            .and(query_param("cmtitle", "Category:Emerging technologies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"categorymembers": [
                    {"pageid": 21, "ns": 14, "title": "Category:Robotics"}
                ]}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("pageids", "21"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{
                    "pageid": 21, "ns": 14, "title": "Category:Robotics",
                    "fullurl": format!("{}/wiki/Category:Robotics", mock_server.uri())
                }]}
            })))
            .mount(&mock_server)
            .await;

        let config = WikiConfig::for_site(&mock_server.uri());
        let client = Arc::new(WikiClient::new(config.clone()).unwrap());
        let mut crawler = CategoryCrawler::new(client, config)
            .with_identity(NodeIdentity::Name)
            .with_main_article(None);

        crawler.explore("Category:Emerging technologies", 1).await.unwrap();

        let graph = crawler.graph();
        assert_eq!(graph.node_count(), 3);
        assert!(graph.has_edge("Category:Emerging technologies", "Category:Robotics"));
        assert_eq!(
            graph.find("Category:Robotics").unwrap().url,
            Some(format!("{}/wiki/Category:Robotics", mock_server.uri()))
        );
    }

    /// A portal whose API URL is percent-encoded keeps one node when a
    /// subcategory lists it again
    #[tokio::test]
    async fn test_cycle_back_to_portal_keeps_one_url_node() {
        let mock_server = MockServer::start().await;
        let portal_url = format!("{}/wiki/Category:Ada_Lovelace%27s_work", mock_server.uri());
        let child_url = format!("{}/wiki/Category:Analytical_Engine", mock_server.uri());

        Mock::given(method("GET"))
            .and(query_param("prop", "info"))
            .and(query_param("titles", "Category:Ada Lovelace's work"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{
                    "pageid": 40, "ns": 14, "title": "Category:Ada Lovelace's work",
                    "fullurl": &portal_url
                }]}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("cmtype", "subcat"))
            .and(query_param("cmtitle", "Category:Ada Lovelace's work"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"categorymembers": [
                    {"pageid": 41, "ns": 14, "title": "Category:Analytical Engine"}
                ]}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("cmtype", "subcat"))
            .and(query_param("cmtitle", "Category:Analytical Engine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"categorymembers": [
                    {"pageid": 40, "ns": 14, "title": "Category:Ada Lovelace's work"}
                ]}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("pageids", "41"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{
                    "pageid": 41, "ns": 14, "title": "Category:Analytical Engine",
                    "fullurl": &child_url
                }]}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("pageids", "40"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{
                    "pageid": 40, "ns": 14, "title": "Category:Ada Lovelace's work",
                    "fullurl": &portal_url
                }]}
            })))
            .mount(&mock_server)
            .await;

        let config = WikiConfig::for_site(&mock_server.uri());
        let client = Arc::new(WikiClient::new(config.clone()).unwrap());
        let mut crawler = CategoryCrawler::new(client, config)
            .with_identity(NodeIdentity::Url)
            .with_main_article(None);

        crawler.explore("Category:Ada Lovelace's work", 2).await.unwrap();

        let graph = crawler.graph();
        assert_eq!(graph.count_kind(NodeKind::Category), 2);
        assert!(graph.has_edge(&portal_url, &child_url));
        assert!(graph.has_edge(&child_url, &portal_url));
    }

    /// A slow API trips the overall crawl deadline
    #[tokio::test]
    async fn test_deadline_reports_incomplete_crawl() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"query": {"categorymembers": []}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let config = WikiConfig::for_site(&mock_server.uri());
        let client = Arc::new(WikiClient::new(config.clone()).unwrap());
        let mut crawler = CategoryCrawler::new(client, config)
            .with_main_article(None)
            .with_deadline(Duration::from_millis(50));

        let err = crawler.explore("Category:Slow", 2).await.unwrap_err();
        assert!(matches!(err, ScanError::CrawlIncomplete { ref portal, .. } if portal == "Category:Slow"));
    }
}
