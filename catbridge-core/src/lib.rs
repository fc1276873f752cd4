pub mod analyze;
pub mod crawl;
pub mod export;
pub mod report;

pub use analyze::{
    AnalysisMode, BridgeAnalysis, CrossGraphAnalyzer, CrossReference, CrossReferenceMap,
    CrossReferenceRecord, union_across_portals,
};
pub use crawl::{
    BridgeOptions, BridgeOutcome, CrawlOptions, PortalCrawl, execute_bridge, execute_crawl,
    generate_crawl_report,
};
pub use export::{GraphFormat, write_graph};
pub use report::{BridgeReport, ReportFormat};

const BANNER: &str = r#"
   ____      _   ____       _     _
  / ___|__ _| |_| __ ) _ __(_) __| | __ _  ___
 | |   / _` | __|  _ \| '__| |/ _` |/ _` |/ _ \
 | |__| (_| | |_| |_) | |  | | (_| | (_| |  __/
  \____\__,_|\__|____/|_|  |_|\__,_|\__, |\___|
                                    |___/
"#;

pub fn print_banner() {
    eprintln!("{}", BANNER);
    eprintln!(
        "  v{} - pages that bridge two wiki category portals\n",
        env!("CARGO_PKG_VERSION")
    );
}
