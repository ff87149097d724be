use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one live validation run.
///
/// Read from an optional YAML file; command-line flags are applied on top.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    pub listen: String,
    pub runtime_root: PathBuf,
    pub server_log: PathBuf,
    pub openapi_file: PathBuf,
    pub health_timeout_secs: f64,
    pub server_package: String,
    /// Full server command line. Replaces the `cargo run` default when set.
    pub server_command: Vec<String>,
    pub health_path: String,
    pub openapi_path: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8788".to_string(),
            runtime_root: PathBuf::from(".aios-openapi-validate"),
            server_log: env::temp_dir().join("aios-openapi-server.log"),
            openapi_file: PathBuf::from("target").join("openapi.json"),
            health_timeout_secs: 20.0,
            server_package: "aios-api".to_string(),
            server_command: Vec::new(),
            health_path: "/healthz".to_string(),
            openapi_path: "/openapi.json".to_string(),
        }
    }
}

impl LiveConfig {
    pub fn health_url(&self) -> String {
        format!("http://{}{}", self.listen, self.health_path)
    }

    pub fn openapi_url(&self) -> String {
        format!("http://{}{}", self.listen, self.openapi_path)
    }

    pub fn health_timeout(&self) -> Result<Duration> {
        let secs = self.health_timeout_secs;
        if !secs.is_finite() || secs < 0.0 {
            bail!("health timeout must be a non-negative number of seconds, got {secs}");
        }
        Duration::try_from_secs_f64(secs)
            .with_context(|| format!("health timeout of {secs}s is out of range"))
    }

    /// Program and arguments for the server, with placeholders expanded.
    ///
    /// `{listen}` and `{runtime_root}` are substituted in every argument.
    pub fn server_invocation(&self) -> Result<(String, Vec<String>)> {
        let template = if self.server_command.is_empty() {
            self.default_command()
        } else {
            self.server_command.clone()
        };
        let runtime_root = self.runtime_root.to_string_lossy();
        let mut words = template.into_iter().map(|word| {
            word.replace("{listen}", &self.listen)
                .replace("{runtime_root}", &runtime_root)
        });
        let Some(program) = words.next() else {
            bail!("server command is empty");
        };
        if program.trim().is_empty() {
            bail!("server command is empty");
        }
        Ok((program, words.collect()))
    }

    fn default_command(&self) -> Vec<String> {
        [
            "cargo",
            "run",
            "--locked",
            "-p",
            self.server_package.as_str(),
            "--",
            "--root",
            "{runtime_root}",
            "--listen",
            "{listen}",
        ]
        .iter()
        .map(|word| word.to_string())
        .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            bail!("listen address must not be empty");
        }
        for (name, path) in [
            ("health_path", &self.health_path),
            ("openapi_path", &self.openapi_path),
        ] {
            if !path.starts_with('/') {
                bail!("{name} must start with '/', got {path:?}");
            }
        }
        self.health_timeout()?;
        Ok(())
    }
}

/// Overrides taken from the command line.
#[derive(Debug, Default)]
pub struct LiveOverrides {
    pub listen: Option<String>,
    pub runtime_root: Option<PathBuf>,
    pub server_log: Option<PathBuf>,
    pub openapi_file: Option<PathBuf>,
    pub health_timeout_secs: Option<f64>,
    pub server_command: Vec<String>,
}

pub fn load(path: Option<&Path>) -> Result<LiveConfig> {
    let Some(path) = path else {
        return Ok(LiveConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

pub fn resolve(path: Option<&Path>, overrides: LiveOverrides) -> Result<LiveConfig> {
    let mut config = load(path)?;
    if let Some(listen) = overrides.listen {
        config.listen = listen;
    }
    if let Some(root) = overrides.runtime_root {
        config.runtime_root = root;
    }
    if let Some(log) = overrides.server_log {
        config.server_log = log;
    }
    if let Some(file) = overrides.openapi_file {
        config.openapi_file = file;
    }
    if let Some(secs) = overrides.health_timeout_secs {
        config.health_timeout_secs = secs;
    }
    if !overrides.server_command.is_empty() {
        config.server_command = overrides.server_command;
    }
    config.validate()?;
    Ok(config)
}
