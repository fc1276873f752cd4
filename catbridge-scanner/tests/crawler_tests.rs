// Tests for the category crawler against an in-memory wiki

use catbridge_scanner::{
    CategoryCrawler, InMemoryWiki, MainArticleStrategy, NodeIdentity, NodeKind, WikiConfig,
};
use std::sync::{Arc, Mutex};

fn crawler(wiki: InMemoryWiki) -> CategoryCrawler<InMemoryWiki> {
    CategoryCrawler::new(Arc::new(wiki), WikiConfig::default())
        .with_identity(NodeIdentity::Name)
        .with_main_article(None)
}

fn chain() -> InMemoryWiki {
    InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:A", &["Category:B"])
        .with_subcategories("Category:B", &["Category:C"])
        .with_subcategories("Category:C", &["Category:D"])
}

// ============================================================================
// Depth bound
// ============================================================================

#[tokio::test]
async fn test_depth_zero_adds_only_the_portal() {
    let mut crawler = crawler(chain());
    crawler.explore("Category:A", 0).await.unwrap();

    let graph = crawler.graph();
    assert_eq!(graph.node_count(), 2);
    assert!(graph.has_edge("root_node", "Category:A"));
    assert_eq!(graph.longest_path_len(), Some(1));
}

#[tokio::test]
async fn test_longest_path_is_bounded_by_depth_plus_one() {
    for depth in 0..4 {
        let mut crawler = crawler(chain());
        crawler.explore("Category:A", depth).await.unwrap();
        let longest = crawler.graph().longest_path_len().unwrap();
        assert!(
            longest <= depth + 1,
            "depth {} produced a path of {} edges",
            depth,
            longest
        );
    }
}

#[tokio::test]
async fn test_depth_one_stops_after_first_subcategory_level() {
    let mut crawler = crawler(chain());
    crawler.explore("Category:A", 1).await.unwrap();

    let graph = crawler.graph();
    assert!(graph.find("Category:B").is_some());
    assert!(graph.find("Category:C").is_none());
    assert_eq!(crawler.stats().categories_expanded, 2);
}

#[tokio::test]
async fn test_portal_without_prefix_is_normalized() {
    let mut crawler = crawler(chain());
    crawler.explore("A", 0).await.unwrap();
    assert!(crawler.graph().find("Category:A").is_some());
}

// ============================================================================
// Node identity and de-duplication
// ============================================================================

#[tokio::test]
async fn test_shared_subcategory_is_one_node_with_two_parents() {
    let wiki = InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:A", &["Category:B", "Category:C"])
        .with_subcategories("Category:B", &["Category:D"])
        .with_subcategories("Category:C", &["Category:D"]);
    let wiki = Arc::new(wiki);

    let mut crawler = CategoryCrawler::new(wiki.clone(), WikiConfig::default())
        .with_identity(NodeIdentity::Name)
        .with_main_article(None);
    crawler.explore("Category:A", 3).await.unwrap();

    let graph = crawler.graph();
    let d_nodes = graph
        .non_root_nodes()
        .filter(|n| n.title == "Category:D")
        .count();
    assert_eq!(d_nodes, 1);
    assert!(graph.has_edge("Category:B", "Category:D"));
    assert!(graph.has_edge("Category:C", "Category:D"));

    let parents: Vec<&str> = graph
        .parents("Category:D")
        .iter()
        .map(|n| n.title.as_str())
        .collect();
    assert_eq!(parents.len(), 2);

    // D is reachable via two paths, so it is listed once per path
    let d_listings = wiki
        .listing_log()
        .iter()
        .filter(|c| c.as_str() == "Category:D")
        .count();
    assert_eq!(d_listings, 2);
}

#[tokio::test]
async fn test_url_identity_uses_canonical_urls() {
    let wiki = chain().with_pages("Category:A", &["Alpha page"]);
    let mut crawler = CategoryCrawler::new(Arc::new(wiki), WikiConfig::default())
        .with_identity(NodeIdentity::Url)
        .with_pages(true)
        .with_main_article(None);
    crawler.explore("Category:A", 0).await.unwrap();

    let graph = crawler.graph();
    let portal = graph
        .find("https://en.wikipedia.org/wiki/Category:A")
        .expect("portal keyed by URL");
    assert_eq!(portal.title, "Category:A");
    assert_eq!(portal.page_id, None);

    let page = graph
        .find("https://en.wikipedia.org/wiki/Alpha_page")
        .expect("page keyed by URL");
    assert_eq!(page.kind, NodeKind::Page);
    assert!(page.page_id.is_some());
}

#[tokio::test]
async fn test_cycles_terminate_through_the_depth_bound() {
    let wiki = InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:A", &["Category:B"])
        .with_subcategories("Category:B", &["Category:A"]);

    let mut crawler = crawler(wiki);
    crawler.explore("Category:A", 5).await.unwrap();

    let graph = crawler.graph();
    assert_eq!(graph.node_count(), 3);
    assert!(graph.has_edge("Category:A", "Category:B"));
    assert!(graph.has_edge("Category:B", "Category:A"));
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(graph.longest_path_len(), None);
    assert_eq!(crawler.stats().categories_expanded, 6);
}

// ============================================================================
// Member pages
// ============================================================================

#[tokio::test]
async fn test_member_pages_hang_off_their_category() {
    let wiki = InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:A", &["Category:B"])
        .with_pages("Category:A", &["Perceptron", "Backpropagation"])
        .with_pages("Category:B", &["Perceptron"]);

    let mut crawler = crawler(wiki).with_pages(true);
    crawler.explore("Category:A", 1).await.unwrap();

    let graph = crawler.graph();
    assert_eq!(graph.count_kind(NodeKind::Page), 2);
    assert!(graph.has_edge("Category:A", "Perceptron"));
    assert!(graph.has_edge("Category:B", "Perceptron"));
    assert_eq!(crawler.stats().pages_added, 2);

    let perceptron = graph.find("Perceptron").unwrap();
    assert_eq!(
        perceptron.url.as_deref(),
        Some("https://en.wikipedia.org/wiki/Perceptron")
    );
}

#[tokio::test]
async fn test_pages_are_skipped_unless_requested() {
    let wiki = chain().with_pages("Category:A", &["Alpha"]);
    let mut crawler = crawler(wiki);
    crawler.explore("Category:A", 1).await.unwrap();
    assert_eq!(crawler.graph().count_kind(NodeKind::Page), 0);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_failed_listing_keeps_siblings() {
    let wiki = InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:A", &["Category:B", "Category:C"])
        .with_subcategories("Category:C", &["Category:E"])
        .with_failing_listing("Category:B");

    let mut crawler = crawler(wiki);
    crawler.explore("Category:A", 2).await.unwrap();

    let graph = crawler.graph();
    assert!(graph.find("Category:B").is_some());
    assert!(graph.find("Category:E").is_some());

    let stats = crawler.stats();
    assert!(stats.is_partial());
    assert_eq!(stats.failures.len(), 1);
    assert_eq!(stats.failures[0].category, "Category:B");
}

#[tokio::test]
async fn test_main_article_lookup_is_best_effort() {
    let wiki = InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:A", &["Category:Mercury", "Category:Orphans"])
        .with_article("A", &[], &[])
        .with_ambiguous("Mercury");

    let mut crawler = CategoryCrawler::new(Arc::new(wiki), WikiConfig::default())
        .with_identity(NodeIdentity::Name)
        .with_main_article(Some(MainArticleStrategy::ByTitle));
    crawler.explore("Category:A", 1).await.unwrap();

    let graph = crawler.graph();
    assert_eq!(graph.non_root_nodes().count(), 3);
    assert_eq!(
        graph.find("Category:A").unwrap().main_article.as_deref(),
        Some("https://en.wikipedia.org/wiki/A")
    );
    assert!(graph.find("Category:Mercury").unwrap().main_article.is_none());
    assert!(graph.find("Category:Orphans").unwrap().main_article.is_none());
    assert_eq!(crawler.stats().main_pages_found, 1);
}

#[tokio::test]
async fn test_progress_callback_sees_every_expansion() {
    let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let mut crawler = crawler(chain()).with_progress_callback(Arc::new(move |level, title| {
        seen_clone.lock().unwrap().push((level, title));
    }));
    crawler.explore("Category:A", 2).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            (0, "Category:A".to_string()),
            (1, "Category:B".to_string()),
            (2, "Category:C".to_string()),
        ]
    );
}
