//! CLI domain: parse, route, output, and presentation only.
//! No orchestration logic; a single route table dispatches to the orchestrator.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_catalog_text, format_compile_result_text, format_history_text,
    format_run_status_text,
};
pub use route::CliContext;
