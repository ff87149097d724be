use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Output {
    pub verbose: bool,
    pub quiet: bool,
    color: bool,
    progress: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let is_tty = atty::is(atty::Stream::Stdout);
        let color = is_tty && env::var_os("NO_COLOR").is_none();
        let progress = is_tty && !verbose && !quiet;
        Self {
            verbose,
            quiet,
            color,
            progress,
        }
    }

    pub fn start_spinner(&self, label: &str) -> Option<ProgressBar> {
        if self.progress {
            let spinner = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["-", "\\", "|", "/"]);
            spinner.set_style(style);
            spinner.set_message(label.to_string());
            spinner.enable_steady_tick(Duration::from_millis(100));
            Some(spinner)
        } else {
            if self.verbose && !self.quiet {
                println!("==> {label}");
            }
            None
        }
    }

    pub fn finish_spinner(&self, spinner: Option<&ProgressBar>, label: &str, success: bool) {
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        if self.quiet || !(self.progress || self.verbose) {
            return;
        }
        println!("{} {label}", self.status_icon(success));
    }

    /// Diagnostic detail, shown only with `--verbose`.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            eprintln!("    {message}");
        }
    }

    pub fn println(&self, message: &str) {
        if !self.quiet {
            println!("{message}");
        }
    }

    pub fn println_always(&self, message: &str) {
        println!("{message}");
    }

    pub fn print_error(&self, message: &str) {
        if self.color {
            eprintln!("{} {}", "error:".red().bold(), message);
        } else {
            eprintln!("error: {message}");
        }
    }

    /// Dump a block of text (e.g. a server log) to stderr under a header.
    pub fn print_block(&self, header: &str, body: &str) {
        if self.color {
            eprintln!("{}", format!("--- {header} ---").dimmed());
        } else {
            eprintln!("--- {header} ---");
        }
        eprintln!("{}", body.trim_end());
    }

    fn status_icon(&self, success: bool) -> String {
        if self.color {
            if success {
                "✓".green().to_string()
            } else {
                "✗".red().to_string()
            }
        } else if success {
            "OK".to_string()
        } else {
            "FAIL".to_string()
        }
    }
}
