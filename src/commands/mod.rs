mod live;
mod validate;

pub use live::run as live;
pub use validate::run as validate;

use crate::error::Failure;
use crate::output::Output;
use crate::util::read_log;

pub fn run_step<T, E>(
    output: &Output,
    label: &str,
    action: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let spinner = output.start_spinner(label);
    let result = action();
    output.finish_spinner(spinner.as_ref(), label, result.is_ok());
    result
}

/// Print a failure to stderr, with the server log when the server never came up.
pub fn report(output: &Output, failure: &Failure) {
    output.print_error(&failure.to_string());
    if let Failure::HealthTimeout { server_log, .. } = failure {
        if let Some(log) = read_log(server_log) {
            output.print_block("server log", &log);
        }
    }
}

pub fn success_message(version: &str) -> String {
    format!("OpenAPI validation succeeded (version {version}).")
}
