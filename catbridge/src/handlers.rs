use anyhow::{Context, Result};
use catbridge_core::analyze::AnalysisMode;
use catbridge_core::crawl::{
    BridgeOptions, CrawlOptions, execute_bridge, execute_crawl, generate_crawl_report,
};
use catbridge_core::export::{GraphFormat, expand_path, render_graph, write_graph};
use catbridge_core::report::{BridgeReport, ReportFormat, generate_report, save_report};
use catbridge_scanner::{
    MainArticleStrategy, NodeIdentity, Retrying, ScanError, WikiApi, WikiClient, WikiConfig,
};
use clap::ArgMatches;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_INCOMPLETE: i32 = 3;
pub const EXIT_TRANSPORT: i32 = 4;

/// Maps an error chain to a process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ScanError>() {
        Some(
            ScanError::InvalidMode(_)
            | ScanError::InvalidOption { .. }
            | ScanError::InvalidNodeIdentityMode(_)
            | ScanError::InvalidUrl(_),
        ) => EXIT_USAGE,
        Some(ScanError::CrawlIncomplete { .. }) => EXIT_INCOMPLETE,
        Some(e) if e.is_transport() => EXIT_TRANSPORT,
        _ => EXIT_FAILURE,
    }
}

/// Environment defaults overridden by the global CLI flags.
pub fn config_from_args(args: &ArgMatches) -> Result<WikiConfig, ScanError> {
    let mut config = WikiConfig::from_env();
    if let Some(site) = args.get_one::<String>("site-url") {
        let site_config = WikiConfig::for_site(site);
        config.site_url = site_config.site_url;
        config.api_url = site_config.api_url;
    }
    if let Some(api) = args.get_one::<String>("api-url") {
        config.api_url = api.clone();
    }
    if let Some(&concurrency) = args.get_one::<usize>("concurrency") {
        config.concurrency = concurrency.max(1);
    }
    if let Some(&seconds) = args.get_one::<u64>("timeout") {
        config.timeout_ms = seconds * 1000;
    }
    config.validate()?;
    Ok(config)
}

fn parse_main_article(value: &str) -> Result<Option<MainArticleStrategy>, ScanError> {
    match value {
        "off" | "none" => Ok(None),
        other => other.parse().map(Some),
    }
}

fn parse_identity(args: &ArgMatches) -> Result<NodeIdentity, ScanError> {
    args.get_one::<String>("identity")
        .map(|s| s.parse())
        .unwrap_or(Ok(NodeIdentity::default()))
}

fn parse_deadline(args: &ArgMatches) -> Option<Duration> {
    args.get_one::<u64>("deadline")
        .map(|&s| Duration::from_secs(s))
}

fn show_progress(args: &ArgMatches) -> bool {
    !args.get_flag("quiet")
}

/// Validates the bridge arguments. Runs before any client exists.
pub fn parse_bridge_options(args: &ArgMatches) -> Result<BridgeOptions, ScanError> {
    let mode: AnalysisMode = args
        .get_one::<String>("MODE")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse()?;
    let main_article = args
        .get_one::<String>("main-article")
        .map(|s| parse_main_article(s))
        .unwrap_or(Ok(Some(MainArticleStrategy::default())))?;

    Ok(BridgeOptions {
        portal_a: args
            .get_one::<String>("PORTAL_A")
            .cloned()
            .unwrap_or_default(),
        portal_b: args
            .get_one::<String>("PORTAL_B")
            .cloned()
            .unwrap_or_default(),
        subcategory_depth: args.get_one::<usize>("DEPTH").copied().unwrap_or(0),
        mode,
        identity: parse_identity(args)?,
        main_article,
        deadline: parse_deadline(args),
        show_progress_bars: show_progress(args),
    })
}

pub fn parse_crawl_options(args: &ArgMatches) -> Result<CrawlOptions, ScanError> {
    let mut options = CrawlOptions::new(
        args.get_one::<String>("PORTAL").cloned().unwrap_or_default(),
        args.get_one::<usize>("DEPTH").copied().unwrap_or(0),
    );
    options.include_pages = args.get_flag("pages");
    options.identity = parse_identity(args)?;
    options.main_article = args
        .get_one::<String>("main-article")
        .map(|s| parse_main_article(s))
        .unwrap_or(Ok(Some(MainArticleStrategy::default())))?;
    options.deadline = parse_deadline(args);
    options.show_progress_bars = show_progress(args);
    Ok(options)
}

/// HTTP client wrapped in the retry policy from `config`.
pub fn build_client(config: &WikiConfig) -> Result<Arc<Retrying<WikiClient>>, ScanError> {
    let client = WikiClient::new(config.clone())?;
    Ok(Arc::new(Retrying::new(
        client,
        config.max_retries,
        Duration::from_millis(config.retry_delay_ms),
    )))
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_partial_warnings(portal: &str, failures: usize) {
    if failures > 0 {
        eprintln!(
            "{} {} is partial: {} listing(s) failed",
            "[!]".yellow().bold(),
            portal.bold(),
            failures
        );
    }
}

pub async fn handle_bridge(args: &ArgMatches) -> Result<()> {
    let options = parse_bridge_options(args)?;
    let config = config_from_args(args)?;
    let client = build_client(&config)?;
    let quiet = args.get_flag("quiet");

    if !quiet {
        print_divider();
        eprintln!(
            "{} {} {} {} (depth {}, mode {})",
            "[*]".bright_cyan().bold(),
            options.portal_a.bold(),
            "⇄".bright_blue(),
            options.portal_b.bold(),
            options.subcategory_depth,
            options.mode.flag()
        );
        print_divider();
    }

    let outcome = execute_bridge(client, &config, options).await?;
    let report = BridgeReport::from_outcome(&outcome);
    print_partial_warnings(&report.portal_a.portal, report.portal_a.failures.len());
    print_partial_warnings(&report.portal_b.portal, report.portal_b.failures.len());

    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::parse(f))
        .unwrap_or(ReportFormat::Text);
    let content = generate_report(&report, format).context("Failed to render report")?;

    match args.get_one::<String>("output") {
        Some(path) => {
            let path = expand_path(path);
            save_report(&content, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} {} bridging page(s), report saved to {}",
                    "[+]".green().bold(),
                    report.pages.len(),
                    path.display()
                );
            }
        }
        None => println!("{}", content),
    }
    debug!("bridge finished after {} requests", outcome.requests);
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let options = parse_crawl_options(args)?;
    let format = args
        .get_one::<String>("format")
        .map(|f| f.parse::<GraphFormat>())
        .transpose()?;
    let config = config_from_args(args)?;
    let client = build_client(&config)?;
    let quiet = args.get_flag("quiet");

    let crawl = execute_crawl(client.clone(), &config, options).await?;
    print_partial_warnings(&crawl.portal, crawl.stats.failures.len());

    match (args.get_one::<String>("output"), format) {
        (Some(path), format) => {
            let path = expand_path(path);
            write_graph(&crawl.graph, &path, format.unwrap_or_default())
                .with_context(|| format!("Failed to write graph to {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} {} nodes written to {}",
                    "[+]".green().bold(),
                    crawl.graph.node_count(),
                    path.display()
                );
            }
        }
        (None, Some(format)) => println!("{}", render_graph(&crawl.graph, format)?),
        (None, None) => print!("{}", generate_crawl_report(&crawl)),
    }
    debug!("crawl finished after {} requests", client.request_count());
    Ok(())
}
