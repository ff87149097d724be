use crate::commands::validate::check;
use crate::commands::{run_step, success_message};
use crate::config::LiveConfig;
use crate::document;
use crate::error::Failure;
use crate::http;
use crate::output::Output;
use crate::spec_validator::SpecValidator;
use crate::supervisor::{ServerProcess, stop_servers_on_interrupt, wait_for_healthy};

pub fn run(config: &LiveConfig, output: &Output) -> Result<(), Failure> {
    let validator = SpecValidator::bundled()?;
    let timeout = config
        .health_timeout()
        .map_err(|err| Failure::Usage(format!("{err:#}")))?;
    let (program, args) = config
        .server_invocation()
        .map_err(|err| Failure::Usage(format!("{err:#}")))?;
    let client = http::client().map_err(Failure::Load)?;
    stop_servers_on_interrupt(output)
        .map_err(|err| Failure::MissingDependency(format!("{err:#}")))?;

    // Dropping `server` stops the process, whichever way this function returns.
    let server = run_step(output, "Start server", || {
        ServerProcess::spawn(&program, &args, &config.server_log, output)
    })
    .map_err(Failure::Load)?;

    let health_url = config.health_url();
    run_step(output, &format!("Wait for {health_url}"), || {
        if wait_for_healthy(&client, &health_url, timeout, output) {
            Ok(())
        } else {
            Err(Failure::HealthTimeout {
                listen: config.listen.clone(),
                server_log: server.log_path().to_path_buf(),
            })
        }
    })?;

    let openapi_url = config.openapi_url();
    let document = run_step(output, &format!("Fetch {openapi_url}"), || {
        document::load_url(&client, &openapi_url)
    })
    .map_err(Failure::Load)?;

    let version = run_step(output, "Validate", || check(&validator, &document))?;

    document::write_pretty(&document, &config.openapi_file).map_err(Failure::Load)?;
    output.println(&format!("Wrote {}", config.openapi_file.display()));
    output.println_always(&success_message(&version));
    drop(server);
    Ok(())
}
