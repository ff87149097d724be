use clap::{Args, Parser};
use std::path::PathBuf;

use crate::config::LiveOverrides;
use crate::document::DocumentSource;

#[derive(Parser, Debug)]
#[command(
    name = "validate-openapi",
    version,
    about = "Validate an OpenAPI 3.1 document from a file or URL"
)]
pub struct StaticCli {
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Exactly one document source.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Path to an OpenAPI JSON (or YAML) file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// URL of an OpenAPI JSON (or YAML) document
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

impl SourceArgs {
    /// The argument group guarantees exactly one of `file` and `url`.
    pub fn into_source(self) -> DocumentSource {
        match self.url {
            Some(url) => DocumentSource::Url(url),
            None => DocumentSource::File(self.file.unwrap_or_default()),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "validate-openapi-live",
    version,
    about = "Start an API server, fetch its OpenAPI document and validate it",
    after_help = "Arguments after `--` replace the server command. \
                  `{listen}` and `{runtime_root}` are expanded in each argument."
)]
pub struct LiveCli {
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
    /// YAML file with live validation settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Address the server listens on [default: 127.0.0.1:8788]
    #[arg(long, value_name = "HOST:PORT")]
    pub listen: Option<String>,
    /// Runtime root passed to the server [default: .aios-openapi-validate]
    #[arg(long, value_name = "PATH")]
    pub runtime_root: Option<PathBuf>,
    /// Where server stdout/stderr is written [default: <tmp>/aios-openapi-server.log]
    #[arg(long, value_name = "PATH")]
    pub server_log: Option<PathBuf>,
    /// Where the fetched document is written [default: target/openapi.json]
    #[arg(long, value_name = "PATH")]
    pub openapi_file: Option<PathBuf>,
    /// Seconds to wait for the health endpoint [default: 20]
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub health_timeout_secs: Option<f64>,
    #[arg(last = true, value_name = "COMMAND")]
    pub server_command: Vec<String>,
}

impl LiveCli {
    pub fn overrides(&self) -> LiveOverrides {
        LiveOverrides {
            listen: self.listen.clone(),
            runtime_root: self.runtime_root.clone(),
            server_log: self.server_log.clone(),
            openapi_file: self.openapi_file.clone(),
            health_timeout_secs: self.health_timeout_secs,
            server_command: self.server_command.clone(),
        }
    }
}
