//! Command line construction and child process execution

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{exit_codes, RunError};
use crate::probe::RunnerMatch;

/// A fully expanded native command, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Runner that produced this command line
    pub tool: &'static str,
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Working directory for the child: the resolved project directory
    pub directory: PathBuf,
}

impl Invocation {
    /// Substitute `command` and the user tail into the runner's template.
    ///
    /// The tail is positional arguments followed by everything after `--`.
    /// It is copied verbatim.
    pub fn build(runner: &RunnerMatch, directory: &Path, command: &OsStr, tail: &[OsString]) -> Self {
        let template = &runner.definition.template;

        let program = template
            .wrapper
            .and_then(|name| wrapper_path(directory, name))
            .map(PathBuf::into_os_string)
            .unwrap_or_else(|| OsString::from(template.program));

        let mut args: Vec<OsString> = template.prefix.iter().map(OsString::from).collect();
        args.push(command.to_os_string());
        if template.separator && !tail.is_empty() {
            args.push(OsString::from("--"));
        }
        args.extend(tail.iter().cloned());

        Self {
            tool: runner.name(),
            program,
            args,
            directory: directory.to_path_buf(),
        }
    }

    /// Shell-style rendering for dry runs and logs
    pub fn display(&self) -> impl fmt::Display + '_ {
        DisplayArgv(self)
    }
}

struct DisplayArgv<'a>(&'a Invocation);

impl fmt::Display for DisplayArgv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.0.program))?;
        for arg in &self.0.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(arg: &OsStr) -> Cow<'_, str> {
    let text = arg.to_string_lossy();
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));

    if plain {
        text
    } else {
        Cow::Owned(format!("'{}'", text.replace('\'', r"'\''")))
    }
}

/// Project-local wrapper script (`gradlew`, `mvnw`), if present
fn wrapper_path(directory: &Path, name: &str) -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(windows) { &[".bat", ".cmd"] } else { &[""] };

    candidates
        .iter()
        .map(|ext| directory.join(format!("{name}{ext}")))
        .find(|path| path.is_file())
}

/// Spawns invocations. Swapped for a recorder in tests.
pub trait CommandBackend {
    /// Run to completion and return the exit code
    fn run(&mut self, invocation: &Invocation) -> io::Result<i32>;
}

/// Real child processes with inherited stdio
#[derive(Debug, Default)]
pub struct ProcessBackend;

impl CommandBackend for ProcessBackend {
    fn run(&mut self, invocation: &Invocation) -> io::Result<i32> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.directory)
            .status()?;

        Ok(exit_code_of(status))
    }
}

/// Child exit code, with signal deaths mapped to `128 + signal`
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    exit_codes::GENERIC_ERROR
}

/// What happened to an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing ran; carries the rendered command line
    DryRun(String),
    Exited { code: i32, elapsed: Duration },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::DryRun(_) => exit_codes::SUCCESS,
            Outcome::Exited { code, .. } => *code,
        }
    }
}

/// Run `invocation` through `backend`, or only render it when `dry_run`
pub fn execute(
    backend: &mut dyn CommandBackend,
    invocation: &Invocation,
    dry_run: bool,
) -> Result<Outcome, RunError> {
    let rendered = invocation.display().to_string();

    if dry_run {
        debug!(command = %rendered, "dry run");
        return Ok(Outcome::DryRun(rendered));
    }

    debug!(command = %rendered, dir = %invocation.directory.display(), "spawning");
    let started = Instant::now();

    match backend.run(invocation) {
        Ok(code) => {
            let elapsed = started.elapsed();
            debug!(code, elapsed_ms = elapsed.as_millis() as u64, "child exited");
            Ok(Outcome::Exited { code, elapsed })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RunError::ToolMissing {
            tool: invocation.tool.to_string(),
            hint: Some(format!(
                "Install {} and make sure `{}` is on your PATH.",
                invocation.tool,
                invocation.program.to_string_lossy()
            )),
        }),
        Err(e) => Err(RunError::SpawnFailure {
            program: invocation.program.to_string_lossy().into_owned(),
            source: e,
        }),
    }
}
