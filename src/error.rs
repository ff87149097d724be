use std::path::PathBuf;
use thiserror::Error;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
/// Reported when the validator is stopped by SIGINT, SIGTERM or SIGHUP.
pub const EXIT_INTERRUPTED: i32 = 130;

/// A failed run. Each variant maps to the exit code the binaries report.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("{0}")]
    Usage(String),
    #[error("missing dependency: {0}")]
    MissingDependency(String),
    #[error("failed to load OpenAPI document: {0:#}")]
    Load(anyhow::Error),
    #[error("expected OpenAPI 3.1.x, got {found}")]
    VersionMismatch { found: String },
    #[error("OpenAPI schema validation failed: {0}")]
    Schema(String),
    #[error("server did not become healthy on {listen}")]
    HealthTimeout { listen: String, server_log: PathBuf },
}

impl Failure {
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::Usage(_) | Failure::MissingDependency(_) => EXIT_USAGE,
            Failure::Load(_)
            | Failure::VersionMismatch { .. }
            | Failure::Schema(_)
            | Failure::HealthTimeout { .. } => EXIT_FAILURE,
        }
    }
}
