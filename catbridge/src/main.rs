use catbridge::{command_argument_builder, exit_code_for, handle_bridge, handle_crawl};
use catbridge_core::print_banner;
use colored::Colorize;
use tracing::Level;

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_logging(verbose, quiet);

    let outcome = match chosen_command.subcommand() {
        Some(("bridge", primary_command)) => handle_bridge(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "[!]".red().bold(), e);
        std::process::exit(exit_code_for(&e));
    }
}
