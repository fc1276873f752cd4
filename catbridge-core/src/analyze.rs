use catbridge_scanner::error::{Result, ScanError};
use catbridge_scanner::graph::{CATEGORY_PREFIX, CategoryGraph, GraphNode};
use catbridge_scanner::{MainArticleResolver, WikiApi, WikiConfig, WikiPage};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// How the two portal graphs are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    /// Main pages of each portal's categories (`-m`).
    MainPagesOnly,
    /// Main pages and member pages (`-p`).
    Pages,
    /// Pages linked from main and member pages (`-l`).
    Links,
}

impl AnalysisMode {
    pub fn include_pages(&self) -> bool {
        !matches!(self, AnalysisMode::MainPagesOnly)
    }

    pub fn flag(&self) -> &'static str {
        match self {
            AnalysisMode::MainPagesOnly => "-m",
            AnalysisMode::Pages => "-p",
            AnalysisMode::Links => "-l",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::MainPagesOnly => "main-pages-only",
            AnalysisMode::Pages => "pages",
            AnalysisMode::Links => "links",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "-m" | "m" | "main" | "main-pages-only" => Ok(AnalysisMode::MainPagesOnly),
            "-p" | "p" | "pages" => Ok(AnalysisMode::Pages),
            "-l" | "l" | "links" => Ok(AnalysisMode::Links),
            _ => Err(ScanError::InvalidMode(s.to_string())),
        }
    }
}

/// One reason a page bridges the portals: the node that led to it and the
/// matched category (unprefixed) present in the other graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub source: String,
    pub category: String,
}

/// Keyed by resolved page title.
pub type CrossReferenceMap = BTreeMap<String, Vec<CrossReference>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossReferenceRecord {
    pub pages: CrossReferenceMap,
    pub urls: BTreeSet<String>,
    /// Nodes (or links) that were looked up.
    pub candidates: usize,
    /// Titles that could not be resolved, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl CrossReferenceRecord {
    fn add(&mut self, page: &WikiPage, source: &str, category: &str) {
        let pair = CrossReference {
            source: source.to_string(),
            category: category.to_string(),
        };
        let entry = self.pages.entry(page.title.clone()).or_default();
        if !entry.contains(&pair) {
            entry.push(pair);
        }
        self.urls.insert(page.url.clone());
    }
}

/// Both directions of an analysis plus their union.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeAnalysis {
    pub a_to_b: CrossReferenceRecord,
    pub b_to_a: CrossReferenceRecord,
    pub pages: BTreeSet<String>,
    pub urls: BTreeSet<String>,
}

impl BridgeAnalysis {
    pub fn skipped(&self) -> usize {
        self.a_to_b.skipped.len() + self.b_to_a.skipped.len()
    }
}

/// Union of page titles and of URLs found in either direction.
pub fn union_across_portals(
    records_a: &CrossReferenceMap,
    urls_a: &BTreeSet<String>,
    records_b: &CrossReferenceMap,
    urls_b: &BTreeSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let pages = records_a.keys().chain(records_b.keys()).cloned().collect();
    let urls = urls_a.union(urls_b).cloned().collect();
    (pages, urls)
}

/// A page, or why it has no single article (missing or ambiguous).
type Resolved = std::result::Result<Arc<WikiPage>, String>;

/// Finds the pages of one graph that carry a category of another graph.
pub struct CrossGraphAnalyzer<'a, A: WikiApi + ?Sized> {
    resolver: MainArticleResolver<'a, A>,
    concurrency: usize,
    cache: Mutex<HashMap<String, Resolved>>,
}

impl<'a, A: WikiApi + ?Sized> CrossGraphAnalyzer<'a, A> {
    pub fn new(api: &'a A, config: &'a WikiConfig) -> Self {
        Self {
            resolver: MainArticleResolver::new(api, config),
            concurrency: config.concurrency.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs `mode` in both directions and unions the results. Transport
    /// failures abort the analysis.
    pub async fn analyze(
        &self,
        mode: AnalysisMode,
        graph_a: &CategoryGraph,
        graph_b: &CategoryGraph,
    ) -> Result<BridgeAnalysis> {
        let (a_to_b, b_to_a) = match mode {
            AnalysisMode::MainPagesOnly | AnalysisMode::Pages => (
                self.find_shared_by_reference(graph_a, graph_b).await?,
                self.find_shared_by_reference(graph_b, graph_a).await?,
            ),
            AnalysisMode::Links => (
                self.find_shared_by_link(graph_a, graph_b).await?,
                self.find_shared_by_link(graph_b, graph_a).await?,
            ),
        };
        let (pages, urls) =
            union_across_portals(&a_to_b.pages, &a_to_b.urls, &b_to_a.pages, &b_to_a.urls);
        info!(
            "{} bridging page(s), {} node(s) skipped",
            pages.len(),
            a_to_b.skipped.len() + b_to_a.skipped.len()
        );
        Ok(BridgeAnalysis {
            a_to_b,
            b_to_a,
            pages,
            urls,
        })
    }

    /// Resolves every non-root node of `source` by title and keeps the pages
    /// with a category that `dest` contains. Missing and ambiguous pages are
    /// skipped; any other lookup error is returned.
    pub async fn find_shared_by_reference(
        &self,
        source: &CategoryGraph,
        dest: &CategoryGraph,
    ) -> Result<CrossReferenceRecord> {
        let dest_categories = dest.category_titles();
        let candidates: Vec<&GraphNode> = source.non_root_nodes().collect();
        let mut record = CrossReferenceRecord {
            candidates: candidates.len(),
            ..CrossReferenceRecord::default()
        };

        let resolved: Vec<(&GraphNode, Resolved)> = stream::iter(candidates)
            .map(|node| async move {
                let page = self.resolve(&node.title).await?;
                Ok::<_, ScanError>((node, page))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        for (node, page) in resolved {
            match page {
                Ok(page) => {
                    self.record_matches(&mut record, &node.identifier, &page, &dest_categories)
                }
                Err(reason) => {
                    warn!("main page for {} not found or ambiguous: {}", node.title, reason);
                    record.skipped.push((node.title.clone(), reason));
                }
            }
        }
        Ok(record)
    }

    /// Like `find_shared_by_reference`, but tests the pages each node links
    /// to. The recorded source is the link title.
    pub async fn find_shared_by_link(
        &self,
        source: &CategoryGraph,
        dest: &CategoryGraph,
    ) -> Result<CrossReferenceRecord> {
        let dest_categories = dest.category_titles();
        let nodes: Vec<&GraphNode> = source.non_root_nodes().collect();
        let mut record = CrossReferenceRecord::default();

        let linking: Vec<(&GraphNode, Resolved)> = stream::iter(nodes)
            .map(|node| async move {
                let page = self.resolve(&node.title).await?;
                Ok::<_, ScanError>((node, page))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut links: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (node, page) in linking {
            match page {
                Ok(page) => {
                    debug!("{} links to {} page(s)", node.title, page.links.len());
                    for link in &page.links {
                        if seen.insert(link.clone()) {
                            links.push(link.clone());
                        }
                    }
                }
                Err(reason) => {
                    warn!("links of {} unavailable: {}", node.title, reason);
                    record.skipped.push((node.title.clone(), reason));
                }
            }
        }
        record.candidates = links.len();

        let resolved: Vec<(String, Resolved)> = stream::iter(links)
            .map(|link| async move {
                let page = self.resolve(&link).await?;
                Ok::<_, ScanError>((link, page))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        for (link, page) in resolved {
            match page {
                Ok(page) => self.record_matches(&mut record, &link, &page, &dest_categories),
                Err(reason) => {
                    debug!("linked page {} skipped: {}", link, reason);
                    record.skipped.push((link, reason));
                }
            }
        }
        Ok(record)
    }

    fn record_matches(
        &self,
        record: &mut CrossReferenceRecord,
        source: &str,
        page: &WikiPage,
        dest_categories: &HashSet<&str>,
    ) {
        for category in &page.categories {
            let prefixed = format!("{}{}", CATEGORY_PREFIX, category);
            if dest_categories.contains(prefixed.as_str()) {
                info!(
                    "page {} (via {}) has category {} in common with the other portal",
                    page.title, source, category
                );
                record.add(page, source, category);
            }
        }
    }

    /// By-title resolution, memoized across both directions. Only pages and
    /// resolution failures are cached; transport errors are returned as is.
    async fn resolve(&self, title: &str) -> Result<Resolved> {
        if let Some(hit) = self.cached(title) {
            return Ok(hit);
        }
        let resolved = match self.resolver.main_page(title).await {
            Ok(page) => Ok(Arc::new(page)),
            Err(e) if e.is_resolution() => Err(e.to_string()),
            Err(e) => return Err(e),
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(title.to_string(), resolved.clone());
        }
        Ok(resolved)
    }

    fn cached(&self, title: &str) -> Option<Resolved> {
        self.cache.lock().ok()?.get(title).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str, &str)]) -> CrossReferenceMap {
        let mut map = CrossReferenceMap::new();
        for (page, source, category) in entries {
            map.entry(page.to_string()).or_default().push(CrossReference {
                source: source.to_string(),
                category: category.to_string(),
            });
        }
        map
    }

    fn urls(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mode_flags_parse() {
        assert_eq!("-m".parse::<AnalysisMode>().unwrap(), AnalysisMode::MainPagesOnly);
        assert_eq!("-p".parse::<AnalysisMode>().unwrap(), AnalysisMode::Pages);
        assert_eq!("-l".parse::<AnalysisMode>().unwrap(), AnalysisMode::Links);
        assert!(matches!(
            "-x".parse::<AnalysisMode>(),
            Err(ScanError::InvalidMode(m)) if m == "-x"
        ));
        assert!(!AnalysisMode::MainPagesOnly.include_pages());
        assert!(AnalysisMode::Links.include_pages());
    }

    #[test]
    fn test_union_is_commutative_and_idempotent() {
        let a = map(&[("Robot", "Category:Robotics", "Artificial intelligence")]);
        let a_urls = urls(&["https://wiki/Robot"]);
        let b = map(&[
            ("Robot", "Category:AI", "Robotics"),
            ("Chatbot", "Category:AI", "Emerging technologies"),
        ]);
        let b_urls = urls(&["https://wiki/Robot", "https://wiki/Chatbot"]);

        let ab = union_across_portals(&a, &a_urls, &b, &b_urls);
        let ba = union_across_portals(&b, &b_urls, &a, &a_urls);
        assert_eq!(ab, ba);
        assert_eq!(ab.0, urls(&["Chatbot", "Robot"]));
        assert_eq!(ab.1.len(), 2);

        let aa = union_across_portals(&a, &a_urls, &a, &a_urls);
        assert_eq!(aa.0, urls(&["Robot"]));
        assert_eq!(aa.1, a_urls);
    }

    #[test]
    fn test_union_of_empty_records_is_empty() {
        let empty = CrossReferenceMap::new();
        let none = BTreeSet::new();
        let (pages, found) = union_across_portals(&empty, &none, &empty, &none);
        assert!(pages.is_empty());
        assert!(found.is_empty());
    }
}
