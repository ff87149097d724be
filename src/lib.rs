pub mod cli;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod output;
pub mod spec_validator;
pub mod supervisor;
pub mod util;

use clap::Parser;

use crate::cli::{LiveCli, StaticCli};
use crate::error::Failure;
use crate::output::Output;

/// Entry point of `validate-openapi`.
pub fn run_static() -> Result<(), Failure> {
    let cli = StaticCli::parse();
    let output = Output::new(cli.verbose, cli.quiet);

    commands::validate(&cli.source.into_source(), &output)
        .inspect_err(|failure| commands::report(&output, failure))
}

/// Entry point of `validate-openapi-live`.
///
/// The server process is owned by [`commands::live`] and is stopped before
/// this function returns, so callers may exit the process immediately.
pub fn run_live() -> Result<(), Failure> {
    let cli = LiveCli::parse();
    let output = Output::new(cli.verbose, cli.quiet);

    let result = config::resolve(cli.config.as_deref(), cli.overrides())
        .map_err(|err| Failure::Usage(format!("{err:#}")))
        .and_then(|config| commands::live(&config, &output));
    result.inspect_err(|failure| commands::report(&output, failure))
}
