//! Error taxonomy and exit codes

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::Ecosystem;

/// Stable process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Failure before any child process was started
    pub const GENERIC_ERROR: i32 = 1;
    /// No runner within the search budget
    pub const RUNNER_NOT_FOUND: i32 = 2;
    /// Several installed tools claim the same project
    pub const LOCKFILE_CONFLICT: i32 = 3;
    /// The resolved tool is not installed
    pub const TOOL_NOT_INSTALLED: i32 = 127;
}

/// Errors that end an invocation before (or instead of) the child's exit code
#[derive(Error, Debug)]
pub enum RunError {
    #[error("No runner found in {} or {levels} level(s) above it", .start.display())]
    NotFound { start: PathBuf, levels: u8 },

    #[error("No runner candidates to choose from")]
    NoCandidates,

    #[error(
        "Conflicting {ecosystem} lockfiles ({}) and {} are all installed",
        .lockfiles.join(", "),
        .tools.join(", ")
    )]
    Conflict {
        ecosystem: Ecosystem,
        tools: Vec<String>,
        lockfiles: Vec<String>,
    },

    #[error("{tool} is not installed")]
    ToolMissing { tool: String, hint: Option<String> },

    #[error("Failed to start {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::NotFound { .. } | RunError::NoCandidates => exit_codes::RUNNER_NOT_FOUND,
            RunError::Conflict { .. } => exit_codes::LOCKFILE_CONFLICT,
            RunError::ToolMissing { .. } => exit_codes::TOOL_NOT_INSTALLED,
            RunError::SpawnFailure { .. } | RunError::Io(_) => exit_codes::GENERIC_ERROR,
        }
    }

    /// Follow-up advice shown under the error message
    pub fn hint(&self) -> Option<String> {
        match self {
            RunError::NotFound { .. } => Some(
                "Use --levels=N to increase search depth or check if you're in the right directory."
                    .to_string(),
            ),
            RunError::Conflict { tools, .. } => Some(format!(
                "Delete the stale lockfile, or pick one with --ignore (e.g. --ignore={})",
                tools.last().map(String::as_str).unwrap_or("<tool>")
            )),
            RunError::ToolMissing { hint, .. } => hint.clone(),
            RunError::NoCandidates | RunError::SpawnFailure { .. } | RunError::Io(_) => None,
        }
    }
}
