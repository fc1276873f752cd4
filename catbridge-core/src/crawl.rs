use crate::analyze::{AnalysisMode, BridgeAnalysis, CrossGraphAnalyzer};
use catbridge_scanner::error::Result;
use catbridge_scanner::graph::category_title;
use catbridge_scanner::{
    CategoryCrawler, CategoryGraph, CrawlStats, MainArticleStrategy, NodeIdentity, NodeKind,
    WikiApi, WikiConfig,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Options for crawling a single portal
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub portal: String,
    pub subcategory_depth: usize,
    pub include_pages: bool,
    pub identity: NodeIdentity,
    pub main_article: Option<MainArticleStrategy>,
    pub deadline: Option<Duration>,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(portal: impl Into<String>, subcategory_depth: usize) -> Self {
        Self {
            portal: portal.into(),
            subcategory_depth,
            include_pages: false,
            identity: NodeIdentity::default(),
            main_article: Some(MainArticleStrategy::default()),
            deadline: None,
            show_progress_bars: false,
        }
    }
}

/// A finished crawl of one portal
#[derive(Debug, Clone)]
pub struct PortalCrawl {
    pub portal: String,
    pub graph: CategoryGraph,
    pub stats: CrawlStats,
    pub elapsed: Duration,
}

/// Options for bridging two portals
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub portal_a: String,
    pub portal_b: String,
    pub subcategory_depth: usize,
    pub mode: AnalysisMode,
    pub identity: NodeIdentity,
    pub main_article: Option<MainArticleStrategy>,
    pub deadline: Option<Duration>,
    pub show_progress_bars: bool,
}

impl BridgeOptions {
    fn crawl_options(&self, portal: &str) -> CrawlOptions {
        CrawlOptions {
            portal: portal.to_string(),
            subcategory_depth: self.subcategory_depth,
            include_pages: self.mode.include_pages(),
            identity: self.identity,
            main_article: self.main_article,
            deadline: self.deadline,
            show_progress_bars: self.show_progress_bars,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeOutcome {
    pub mode: AnalysisMode,
    pub crawl_a: PortalCrawl,
    pub crawl_b: PortalCrawl,
    pub analysis: BridgeAnalysis,
    pub requests: usize,
    pub elapsed: Duration,
}

fn spinner(multi: Option<&MultiProgress>, message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let pb = match multi {
        Some(multi) => multi.add(pb),
        None => pb,
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Crawl one portal into a category graph
pub async fn execute_crawl<A: WikiApi + ?Sized>(
    api: Arc<A>,
    config: &WikiConfig,
    options: CrawlOptions,
) -> Result<PortalCrawl> {
    crawl_portal(api, config, options, None).await
}

async fn crawl_portal<A: WikiApi + ?Sized>(
    api: Arc<A>,
    config: &WikiConfig,
    options: CrawlOptions,
    multi: Option<&MultiProgress>,
) -> Result<PortalCrawl> {
    let CrawlOptions {
        portal,
        subcategory_depth,
        include_pages,
        identity,
        main_article,
        deadline,
        show_progress_bars,
    } = options;
    let portal = category_title(&portal);

    let progress_bar = show_progress_bars
        .then(|| Arc::new(spinner(multi, format!("Crawling {}...", portal))));

    // Counter for expanded categories
    let expanded = Arc::new(AtomicUsize::new(0));

    let progress_callback: catbridge_scanner::ProgressCallback = match progress_bar.clone() {
        Some(pb) => {
            let count = expanded.clone();
            let label = portal.clone();
            Arc::new(move |level: usize, title: String| {
                let n = count.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!(
                    "Crawling {}... {} categories (level {}: {})",
                    label, n, level, title
                ));
            })
        }
        None => Arc::new(|_level: usize, _title: String| {}),
    };

    let mut crawler = CategoryCrawler::new(api, config.clone())
        .with_pages(include_pages)
        .with_identity(identity)
        .with_main_article(main_article)
        .with_concurrency(config.concurrency)
        .with_progress_callback(progress_callback);
    if let Some(deadline) = deadline {
        crawler = crawler.with_deadline(deadline);
    }

    let started = Instant::now();
    let outcome = crawler.explore(&portal, subcategory_depth).await;
    let elapsed = started.elapsed();

    if let Some(pb) = progress_bar {
        match &outcome {
            Ok(()) => pb.finish_with_message(format!(
                "{} crawled: {} nodes in {:.1}s",
                portal,
                crawler.graph().node_count(),
                elapsed.as_secs_f64()
            )),
            Err(e) => pb.abandon_with_message(format!("{} failed: {}", portal, e)),
        }
    }
    outcome?;

    let (graph, stats) = crawler.into_parts();
    info!(
        "{}: {} nodes, {} edges, {} failure(s)",
        portal,
        graph.node_count(),
        graph.edge_count(),
        stats.failures.len()
    );
    Ok(PortalCrawl {
        portal,
        graph,
        stats,
        elapsed,
    })
}

/// Crawl both portals concurrently, then cross-reference them
pub async fn execute_bridge<A: WikiApi + ?Sized>(
    api: Arc<A>,
    config: &WikiConfig,
    options: BridgeOptions,
) -> Result<BridgeOutcome> {
    let started = Instant::now();
    let multi = options.show_progress_bars.then(MultiProgress::new);

    let (crawl_a, crawl_b) = tokio::try_join!(
        crawl_portal(
            api.clone(),
            config,
            options.crawl_options(&options.portal_a),
            multi.as_ref()
        ),
        crawl_portal(
            api.clone(),
            config,
            options.crawl_options(&options.portal_b),
            multi.as_ref()
        ),
    )?;

    let analysis_bar = multi.as_ref().map(|m| {
        spinner(
            Some(m),
            format!("Cross-referencing ({})...", options.mode.as_str()),
        )
    });
    let analyzer = CrossGraphAnalyzer::new(api.as_ref(), config);
    let analysis = analyzer
        .analyze(options.mode, &crawl_a.graph, &crawl_b.graph)
        .await;
    if let Some(pb) = analysis_bar {
        match &analysis {
            Ok(analysis) => pb.finish_with_message(format!(
                "{} bridging page(s) found",
                analysis.pages.len()
            )),
            Err(e) => pb.abandon_with_message(format!("Cross-referencing failed: {}", e)),
        }
    }
    let analysis = analysis?;

    Ok(BridgeOutcome {
        mode: options.mode,
        crawl_a,
        crawl_b,
        analysis,
        requests: api.request_count(),
        elapsed: started.elapsed(),
    })
}

/// Generate a plain summary of one portal crawl
pub fn generate_crawl_report(crawl: &PortalCrawl) -> String {
    let graph = &crawl.graph;
    let stats = &crawl.stats;

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("# {}\n", crawl.portal));
    report.push_str(&format!(
        "  Categories: {}\n",
        graph.count_kind(NodeKind::Category)
    ));
    report.push_str(&format!("  Pages: {}\n", graph.count_kind(NodeKind::Page)));
    report.push_str(&format!("  Edges: {}\n", graph.edge_count()));
    report.push_str(&format!(
        "  Categories expanded: {}\n",
        stats.categories_expanded
    ));
    report.push_str(&format!("  Main pages found: {}\n", stats.main_pages_found));
    match graph.longest_path_len() {
        Some(len) => report.push_str(&format!("  Longest path: {} edges\n", len)),
        None => report.push_str("  Longest path: n/a (graph has a cycle)\n"),
    }
    report.push_str(&format!("  Elapsed: {:.1}s\n", crawl.elapsed.as_secs_f64()));

    if stats.is_partial() {
        report.push_str("\n## Failed listings (graph is partial)\n");
        for failure in &stats.failures {
            report.push_str(&format!("  {}: {}\n", failure.category, failure.error));
        }
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}
