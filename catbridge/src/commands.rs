use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("catbridge")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("catbridge")
        .about("Finds the wiki pages that bridge two category portals")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "Log every API call")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"api-url" <URL>)
                .required(false)
                .global(true)
                .help("MediaWiki API endpoint (default: English Wikipedia, or CATBRIDGE_API_URL)"),
        )
        .arg(
            arg!(--"site-url" <URL>)
                .required(false)
                .global(true)
                .help("Site root used to build article URLs (or CATBRIDGE_SITE_URL)"),
        )
        .arg(
            arg!(--"concurrency" <NUM>)
                .required(false)
                .global(true)
                .help("Maximum in-flight API requests per crawl level")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .global(true)
                .help("Request timeout in seconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .subcommand_required(false)
        .subcommand(
            command!("bridge")
                .about(
                    "Crawl two category portals and list the pages whose categories bridge \
                them.",
                )
                .arg(arg!(<PORTAL_A>).help("First portal category, e.g. \"Category:Emerging technologies\""))
                .arg(arg!(<PORTAL_B>).help("Second portal category"))
                .arg(
                    arg!(<DEPTH>)
                        .help("Subcategory levels to expand below each portal")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(<MODE>)
                        .help("-m main pages only, -p main and member pages, -l linked pages")
                        .allow_hyphen_values(true),
                )
                .arg(
                    arg!(--"identity" <IDENTITY>)
                        .required(false)
                        .help("Node identity: url or name")
                        .default_value("url"),
                )
                .arg(
                    arg!(--"main-article" <STRATEGY>)
                        .required(false)
                        .help("Main-article lookup while crawling: title, scan or off")
                        .default_value("title"),
                )
                .arg(
                    arg!(--"deadline" <SECONDS>)
                        .required(false)
                        .help("Abort a portal crawl that runs longer than this")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl one category portal and summarise or export its graph.")
                .arg(arg!(<PORTAL>).help("Portal category"))
                .arg(
                    arg!(<DEPTH>)
                        .help("Subcategory levels to expand below the portal")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"pages")
                        .required(false)
                        .help("Include member pages")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"identity" <IDENTITY>)
                        .required(false)
                        .help("Node identity: url or name")
                        .default_value("url"),
                )
                .arg(
                    arg!(--"main-article" <STRATEGY>)
                        .required(false)
                        .help("Main-article lookup: title, scan or off")
                        .default_value("title"),
                )
                .arg(
                    arg!(--"deadline" <SECONDS>)
                        .required(false)
                        .help("Abort the crawl if it runs longer than this")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Graph format: json, dot (default: text summary)")
                        .value_parser(["json", "dot"]),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the graph to a file (json unless --format dot)"),
                ),
        )
}
