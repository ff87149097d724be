use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{self, Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::EXIT_INTERRUPTED;
use crate::http;
use crate::output::Output;
use crate::util::{command_line, write_log_header};

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

const EXIT_POLL: Duration = Duration::from_millis(50);

// Pids of spawned servers whose handle has not finished terminating them.
static RUNNING: Mutex<Vec<u32>> = Mutex::new(Vec::new());

fn running() -> MutexGuard<'static, Vec<u32>> {
    RUNNING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A server subprocess used as a validation target.
///
/// The process is terminated when the handle is dropped, so every exit path
/// out of the owning scope (including `?` and unwinding) tears it down.
pub struct ServerProcess<'a> {
    child: Child,
    log_path: PathBuf,
    output: &'a Output,
    terminated: bool,
}

impl<'a> ServerProcess<'a> {
    /// Start `program` with stdout and stderr appended to `log_path`.
    ///
    /// The log is truncated and starts with the command line. On Unix the
    /// child leads its own process group so wrappers such as `cargo run` are
    /// stopped together with the server they launch.
    pub fn spawn(
        program: &str,
        args: &[String],
        log_path: &Path,
        output: &'a Output,
    ) -> Result<Self> {
        let line = command_line(program, args);
        write_log_header(log_path, &line)?;
        let log_file = OpenOptions::new()
            .append(true)
            .open(log_path)
            .context("Failed to open server log")?;
        let log_err = log_file.try_clone().context("Failed to clone log file")?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_err));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut running = running();
        let child = command
            .spawn()
            .with_context(|| format!("Failed to start server: {line}"))?;
        running.push(child.id());
        drop(running);
        output.debug(&format!("started server (pid {}): {line}", child.id()));
        Ok(Self {
            child,
            log_path: log_path.to_path_buf(),
            output,
            terminated: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Stop the process: SIGTERM, then SIGKILL after [`TERMINATE_GRACE`].
    ///
    /// Idempotent and infallible. A process that already exited is left alone.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.stop();

        let pid = self.id();
        let mut running = running();
        if let Some(index) = running.iter().position(|&p| p == pid) {
            running.swap_remove(index);
        }
    }

    fn stop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.output
                    .debug(&format!("server (pid {}) already exited: {status}", self.id()));
                return;
            }
            Ok(None) => {}
            Err(err) => {
                self.output
                    .debug(&format!("failed to poll server (pid {}): {err}", self.id()));
            }
        }

        self.output
            .debug(&format!("stopping server (pid {})", self.id()));
        signal_shutdown(&mut self.child);
        if wait_for_exit(&mut self.child, TERMINATE_GRACE) {
            return;
        }

        self.output.debug(&format!(
            "server (pid {}) ignored SIGTERM for {}s, killing",
            self.id(),
            TERMINATE_GRACE.as_secs()
        ));
        force_kill(&mut self.child);
        if !wait_for_exit(&mut self.child, TERMINATE_GRACE) {
            self.output
                .debug(&format!("server (pid {}) did not exit after kill", self.id()));
        }
    }
}

impl Drop for ServerProcess<'_> {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Stop every running server before the validator dies from SIGINT, SIGTERM
/// or SIGHUP, then exit with [`EXIT_INTERRUPTED`].
///
/// Servers lead their own process group, so a terminal Ctrl-C never reaches
/// them directly.
pub fn stop_servers_on_interrupt(output: &Output) -> Result<()> {
    let output = output.clone();
    ctrlc::set_handler(move || {
        // Held until exit so no server can be spawned behind our back.
        let mut running = running();
        for pid in running.drain(..) {
            output.debug(&format!("interrupted, stopping server (pid {pid})"));
            stop_detached(pid);
        }
        output.print_error("interrupted");
        process::exit(EXIT_INTERRUPTED);
    })
    .context("Failed to install interrupt handler")
}

/// Poll `url` every [`POLL_INTERVAL`] until it answers 200 or `timeout` passes.
///
/// Request failures of any kind count as "not ready yet". Each attempt may
/// take up to the time left before the deadline. A zero timeout returns
/// `false` without sending a request.
pub fn wait_for_healthy(client: &Client, url: &str, timeout: Duration, output: &Output) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let attempt_timeout = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => left,
                _ => return false,
            },
            None => http::FETCH_TIMEOUT,
        };
        match http::probe(client, url, attempt_timeout) {
            Ok(status) if status == StatusCode::OK => return true,
            Ok(status) => output.debug(&format!("{url} answered {status}")),
            Err(err) => output.debug(&format!("{url} not ready: {err}")),
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn wait_for_exit(child: &mut Child, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(_) => return false,
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(EXIT_POLL);
    }
}

#[cfg(unix)]
fn signal_shutdown(child: &mut Child) {
    signal_group(child, libc::SIGTERM);
}

#[cfg(not(unix))]
fn signal_shutdown(child: &mut Child) {
    let _ = child.kill();
}

fn force_kill(child: &mut Child) {
    #[cfg(unix)]
    signal_group(child, libc::SIGKILL);
    let _ = child.kill();
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // The child is not reaped yet, so its pid (and group id) is still ours.
    unsafe {
        libc::kill(-pid, signal);
    }
}

/// Terminate a server by pid from outside its handle, reaping it directly.
#[cfg(unix)]
fn stop_detached(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    unsafe {
        libc::kill(-pid, libc::SIGTERM);
    }
    if reap(pid, TERMINATE_GRACE) {
        return;
    }
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
    reap(pid, TERMINATE_GRACE);
}

#[cfg(not(unix))]
fn stop_detached(_pid: u32) {}

#[cfg(unix)]
fn reap(pid: libc::pid_t, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        let mut status = 0;
        // Non-zero: reaped here, or already reaped by the owning handle.
        if unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) } != 0 {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(EXIT_POLL);
    }
}
