// Tests for report generation and graph export

use catbridge_core::analyze::AnalysisMode;
use catbridge_core::crawl::{BridgeOptions, BridgeOutcome, execute_bridge};
use catbridge_core::export::{GraphFormat, expand_path, write_graph};
use catbridge_core::report::{
    BridgeReport, ReportFormat, generate_json_report, generate_report, generate_text_report,
    save_report,
};
use catbridge_scanner::{InMemoryWiki, NodeIdentity, WikiConfig};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

async fn outcome() -> BridgeOutcome {
    let wiki = InMemoryWiki::new(WikiConfig::default())
        .with_subcategories("Category:Cycling", &["Category:Bicycles"])
        .with_subcategories(
            "Category:Engineering",
            &["Category:Mechanics", "Category:Robotics"],
        )
        .with_article("Bicycles", &["Mechanics", "Vehicles"], &[])
        .with_failing_listing("Category:Robotics");
    let options = BridgeOptions {
        portal_a: "Category:Cycling".to_string(),
        portal_b: "Category:Engineering".to_string(),
        subcategory_depth: 2,
        mode: AnalysisMode::MainPagesOnly,
        identity: NodeIdentity::Name,
        main_article: None,
        deadline: None,
        show_progress_bars: false,
    };
    execute_bridge(Arc::new(wiki), &WikiConfig::default(), options)
        .await
        .unwrap()
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_parse() {
    assert_eq!(ReportFormat::parse("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::parse("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::parse("csv"), None);
}

// ============================================================================
// Bridge Report Tests
// ============================================================================

#[tokio::test]
async fn test_report_collects_both_directions() {
    let report = BridgeReport::from_outcome(&outcome().await);

    assert_eq!(report.mode, "main-pages-only");
    assert_eq!(report.portal_a.portal, "Category:Cycling");
    assert_eq!(report.portal_a.categories, 2);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].title, "Bicycles");
    assert_eq!(report.pages[0].from_a.len(), 1);
    assert!(report.pages[0].from_b.is_empty());
    assert_eq!(report.urls, vec!["https://en.wikipedia.org/wiki/Bicycles"]);
    assert!(report.portal_b.is_partial());
    assert!(report.is_partial());
}

#[tokio::test]
async fn test_text_report_sections() {
    let report = BridgeReport::from_outcome(&outcome().await);
    let text = generate_text_report(&report);

    assert!(text.contains("CATBRIDGE REPORT"));
    assert!(text.contains("Mode:         main-pages-only"));
    assert!(text.contains("BRIDGING PAGES (1)"));
    assert!(text.contains("A→B via Category:Bicycles (category: Mechanics)"));
    assert!(text.contains("Partial graph, 1 listing(s) failed"));
    assert!(text.contains("https://en.wikipedia.org/wiki/Bicycles"));
}

#[tokio::test]
async fn test_json_report_structure() {
    let report = BridgeReport::from_outcome(&outcome().await);
    let json = generate_json_report(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["report"]["metadata"]["generator"], "catbridge");
    assert_eq!(value["report"]["metadata"]["partial"], true);
    assert_eq!(value["report"]["bridge"]["mode"], "main-pages-only");
    assert_eq!(
        value["report"]["bridge"]["pages"][0]["from_a"][0]["category"],
        "Mechanics"
    );
    assert!(value["report"]["bridge"]["pages"][0].get("from_b").is_none());
}

#[tokio::test]
async fn test_save_report_to_file() -> Result<(), Box<dyn std::error::Error>> {
    let report = BridgeReport::from_outcome(&outcome().await);
    let dir = TempDir::new()?;
    let path = dir.path().join("bridge.txt");

    let content = generate_report(&report, ReportFormat::Text)?;
    save_report(&content, &path)?;

    assert_eq!(fs::read_to_string(&path)?, content);
    Ok(())
}

// ============================================================================
// Graph Export Tests
// ============================================================================

#[tokio::test]
async fn test_write_graph_creates_parent_directories() -> Result<(), Box<dyn std::error::Error>> {
    let outcome = outcome().await;
    let dir = TempDir::new()?;
    let path = dir.path().join("graphs").join("cycling.json");

    write_graph(&outcome.crawl_a.graph, &path, GraphFormat::Json)?;
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(value["directed"], true);
    assert_eq!(value["nodes"].as_array().map(|n| n.len()), Some(3));

    let dot_path = dir.path().join("cycling.dot");
    write_graph(&outcome.crawl_a.graph, &dot_path, GraphFormat::Dot)?;
    assert!(fs::read_to_string(&dot_path)?.starts_with("digraph"));
    Ok(())
}

#[test]
fn test_expand_path_resolves_home() {
    let expanded = expand_path("~/graph.json");
    if std::env::var_os("HOME").is_some() {
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
    assert!(expanded.ends_with("graph.json"));
}
