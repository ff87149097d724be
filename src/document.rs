use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Failure;
use crate::http;
use crate::util::ensure_parent_dir;

const SUPPORTED_SERIES: &str = "3.1.";

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::File(path) => write!(f, "{}", path.display()),
            DocumentSource::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Format::Yaml
        } else {
            Format::Json
        }
    }
}

pub fn load(source: &DocumentSource) -> Result<Value> {
    match source {
        DocumentSource::File(path) => load_file(path),
        DocumentSource::Url(url) => load_url(&http::client()?, url),
    }
}

pub fn load_file(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let format = Format::from_path(&path.to_string_lossy());
    parse(&content, format).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_url(client: &Client, url: &str) -> Result<Value> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;
    let body = http::fetch_text(client, parsed.as_str())?;
    let format = Format::from_path(parsed.path());
    parse(&body, format).with_context(|| format!("Failed to parse response from {url}"))
}

fn parse(content: &str, format: Format) -> Result<Value> {
    let document: Value = match format {
        Format::Json => serde_json::from_str(content)?,
        Format::Yaml => serde_yaml::from_str(content)?,
    };
    if !document.is_object() {
        bail!("document root is not an object");
    }
    Ok(document)
}

/// Return the document's `openapi` version if it belongs to the 3.1 series.
pub fn check_version(document: &Value) -> Result<String, Failure> {
    match document.get("openapi") {
        Some(Value::String(version)) if version.starts_with(SUPPORTED_SERIES) => {
            Ok(version.clone())
        }
        found => Err(Failure::VersionMismatch {
            found: found.unwrap_or(&Value::Null).to_string(),
        }),
    }
}

/// Write the document as two-space indented JSON, replacing any previous file.
pub fn write_pretty(document: &Value, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let content =
        serde_json::to_string_pretty(document).context("Failed to serialize OpenAPI document")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
