use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Render a program and its arguments the way a shell user would type them.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = quote(program);
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg));
    }
    line
}

fn quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@{}%+,".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

// Logging utilities

pub fn write_log_header(log_path: &Path, command_line: &str) -> Result<()> {
    ensure_parent_dir(log_path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)
        .context("Failed to create log file")?;
    writeln!(file, "$ {command_line}")?;
    writeln!(file)?;
    Ok(())
}

/// Best-effort read of a log file for diagnostics; never fails.
pub fn read_log(log_path: &Path) -> Option<String> {
    let bytes = fs::read(log_path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
