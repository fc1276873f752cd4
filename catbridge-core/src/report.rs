// Report generation from a finished bridge run

use crate::analyze::CrossReference;
use crate::crawl::{BridgeOutcome, PortalCrawl};
use catbridge_scanner::NodeKind;
use catbridge_scanner::result::CrawlFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSummary {
    pub portal: String,
    pub categories: usize,
    pub pages: usize,
    pub edges: usize,
    pub categories_expanded: usize,
    pub main_pages_found: usize,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<CrawlFailure>,
}

impl PortalSummary {
    fn from_crawl(crawl: &PortalCrawl) -> Self {
        Self {
            portal: crawl.portal.clone(),
            categories: crawl.graph.count_kind(NodeKind::Category),
            pages: crawl.graph.count_kind(NodeKind::Page),
            edges: crawl.graph.edge_count(),
            categories_expanded: crawl.stats.categories_expanded,
            main_pages_found: crawl.stats.main_pages_found,
            elapsed_seconds: crawl.elapsed.as_secs_f64(),
            failures: crawl.stats.failures.clone(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// A page found in either direction, with the reasons from each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgingPage {
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub from_a: Vec<CrossReference>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub from_b: Vec<CrossReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeReport {
    pub generated_at: DateTime<Utc>,
    pub mode: String,
    pub portal_a: PortalSummary,
    pub portal_b: PortalSummary,
    pub pages: Vec<BridgingPage>,
    pub urls: Vec<String>,
    pub skipped_lookups: usize,
    pub requests: usize,
    pub elapsed_seconds: f64,
}

impl BridgeReport {
    pub fn from_outcome(outcome: &BridgeOutcome) -> Self {
        let analysis = &outcome.analysis;
        let pages = analysis
            .pages
            .iter()
            .map(|title| BridgingPage {
                title: title.clone(),
                from_a: analysis.a_to_b.pages.get(title).cloned().unwrap_or_default(),
                from_b: analysis.b_to_a.pages.get(title).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            mode: outcome.mode.as_str().to_string(),
            portal_a: PortalSummary::from_crawl(&outcome.crawl_a),
            portal_b: PortalSummary::from_crawl(&outcome.crawl_b),
            pages,
            urls: analysis.urls.iter().cloned().collect(),
            skipped_lookups: analysis.skipped(),
            requests: outcome.requests,
            elapsed_seconds: outcome.elapsed.as_secs_f64(),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.portal_a.is_partial() || self.portal_b.is_partial()
    }
}

fn push_portal(report: &mut String, summary: &PortalSummary) {
    report.push_str(&format!("{}\n", summary.portal));
    report.push_str(&format!(
        "  Categories: {}   Pages: {}   Edges: {}\n",
        summary.categories, summary.pages, summary.edges
    ));
    report.push_str(&format!(
        "  Expanded: {}   Main pages found: {}   Time: {:.1}s\n",
        summary.categories_expanded, summary.main_pages_found, summary.elapsed_seconds
    ));
    if summary.is_partial() {
        report.push_str(&format!(
            "  Partial graph, {} listing(s) failed:\n",
            summary.failures.len()
        ));
        for failure in &summary.failures {
            report.push_str(&format!("    {}: {}\n", failure.category, failure.error));
        }
    }
    report.push('\n');
}

fn push_references(report: &mut String, arrow: &str, refs: &[CrossReference]) {
    for r in refs {
        report.push_str(&format!(
            "    {} via {} (category: {})\n",
            arrow, r.source, r.category
        ));
    }
}

pub fn generate_text_report(data: &BridgeReport) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                          CATBRIDGE REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Generated:    {}\n", data.generated_at.to_rfc3339()));
    report.push_str(&format!("Mode:         {}\n", data.mode));
    report.push_str(&format!("Requests:     {}\n", data.requests));
    report.push_str(&format!("Duration:     {:.1} seconds\n\n", data.elapsed_seconds));

    report.push_str(RULE);
    report.push_str("\nPORTALS\n");
    report.push_str(RULE);
    report.push_str("\n\n");
    push_portal(&mut report, &data.portal_a);
    push_portal(&mut report, &data.portal_b);

    report.push_str(RULE);
    report.push_str(&format!("\nBRIDGING PAGES ({})\n", data.pages.len()));
    report.push_str(RULE);
    report.push_str("\n\n");

    if data.pages.is_empty() {
        report.push_str("  (none)\n");
    }
    for page in &data.pages {
        report.push_str(&format!("  {}\n", page.title));
        push_references(&mut report, "A→B", &page.from_a);
        push_references(&mut report, "B→A", &page.from_b);
    }

    if !data.urls.is_empty() {
        report.push_str("\nURLs:\n");
        for url in &data.urls {
            report.push_str(&format!("  {}\n", url));
        }
    }

    if data.skipped_lookups > 0 {
        report.push_str(&format!(
            "\n{} lookup(s) skipped (missing or ambiguous pages)\n",
            data.skipped_lookups
        ));
    }
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');

    report
}

pub fn generate_json_report(data: &BridgeReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "catbridge",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at.to_rfc3339(),
                "format": "json",
                "partial": data.is_partial(),
            },
            "bridge": data,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_report(data: &BridgeReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
