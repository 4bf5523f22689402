//! SMT solver backends
//!
//! `Z3Process` feeds a script to `z3 -in -smt2` and reads the answer from
//! stdout. The solver enforces its own timeout through the script; the
//! process is killed if it overruns that by more than `KILL_GRACE`.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use super::model::Model;

/// Extra time granted past the script timeout before the process is killed
pub const KILL_GRACE: Duration = Duration::from_secs(1);

/// Interval between exit polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Answer to `(check-sat)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverResult {
    /// Satisfiable, with the model when the solver produced one
    Sat { model: Option<Model> },
    Unsat,
    Unknown { reason: String },
    Timeout,
}

/// Failures running the solver itself
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("failed to start solver `{path}`: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("solver I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected solver output: {0}")]
    UnexpectedOutput(String),
}

/// A solver that answers SMT-LIB2 scripts
pub trait SmtBackend: Send + Sync {
    /// Identity of the solver build, or `None` when the solver is unavailable
    fn build_id(&self) -> Option<String>;

    /// Run one script to completion
    fn solve(&self, script: &str, timeout: Duration) -> Result<SolverResult, SolverError>;
}

/// Z3 as a subprocess
#[derive(Debug, Clone)]
pub struct Z3Process {
    path: PathBuf,
}

impl Z3Process {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the solver binary runs on this system
    pub fn is_available(&self) -> bool {
        self.build_id().is_some()
    }
}

impl Default for Z3Process {
    fn default() -> Self {
        Self::new("z3")
    }
}

impl SmtBackend for Z3Process {
    fn build_id(&self) -> Option<String> {
        let output = Command::new(&self.path)
            .arg("--version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .inspect_err(|e| debug!(path = %self.path.display(), error = %e, "solver not runnable"))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_build_id(&String::from_utf8_lossy(&output.stdout))
    }

    fn solve(&self, script: &str, timeout: Duration) -> Result<SolverResult, SolverError> {
        let mut child = Command::new(&self.path)
            .arg("-in")
            .arg("-smt2")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                path: self.path.clone(),
                source,
            })?;

        // Drain stdout concurrently so a large model cannot fill the pipe
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut out = String::new();
                stdout.read_to_string(&mut out).map(|_| out)
            })
        });

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(script.as_bytes())
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e.into());
        }

        let status = wait_timeout(&mut child, timeout + KILL_GRACE)?;
        if status.is_none() {
            let _ = child.kill();
            let _ = child.wait();
            if let Some(reader) = reader {
                let _ = reader.join();
            }
            debug!(timeout_ms = timeout.as_millis() as u64, "solver killed after deadline");
            return Ok(SolverResult::Timeout);
        }

        let output = match reader {
            Some(reader) => reader
                .join()
                .map_err(|_| SolverError::UnexpectedOutput("stdout reader panicked".to_string()))??,
            None => String::new(),
        };
        parse_response(&output)
    }
}

/// Poll for exit until `timeout` elapses. `Ok(None)` means still running.
fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Classify solver output: the first line answers `(check-sat)`, the rest is the model.
pub fn parse_response(output: &str) -> Result<SolverResult, SolverError> {
    let output = output.trim_start();
    let (first, rest) = output.split_once('\n').unwrap_or((output, ""));
    match first.trim() {
        "sat" => Ok(SolverResult::Sat {
            model: Model::parse(rest),
        }),
        "unsat" => Ok(SolverResult::Unsat),
        "unknown" => Ok(SolverResult::Unknown {
            reason: "solver returned unknown".to_string(),
        }),
        "timeout" => Ok(SolverResult::Timeout),
        "" => Err(SolverError::UnexpectedOutput("empty response".to_string())),
        other => Err(SolverError::UnexpectedOutput(other.to_string())),
    }
}

/// Extract the version from `Z3 version 4.12.0 - 64 bit`
pub fn parse_build_id(version_output: &str) -> Option<String> {
    let line = version_output.lines().next()?.trim();
    let mut words = line.split_whitespace();
    while let Some(word) = words.next() {
        if word.eq_ignore_ascii_case("version") {
            return words.next().map(str::to_string);
        }
    }
    (!line.is_empty()).then(|| line.to_string())
}
