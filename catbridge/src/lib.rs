pub mod commands;
pub mod handlers;

pub use commands::command_argument_builder;
pub use handlers::{
    build_client, config_from_args, exit_code_for, handle_bridge, handle_crawl,
    parse_bridge_options, parse_crawl_options,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
