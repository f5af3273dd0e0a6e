//! Installed-tool lookup

use std::collections::HashSet;
use std::process::Command;

/// Answers whether an executable is available to spawn
pub trait ToolChecker {
    fn is_installed(&self, tool: &str) -> bool;
}

/// Looks tools up on `PATH` (and `PATHEXT` on Windows)
#[derive(Debug, Clone, Copy, Default)]
pub struct WhichChecker;

impl ToolChecker for WhichChecker {
    fn is_installed(&self, tool: &str) -> bool {
        let found = which::which(tool).is_ok();
        tracing::debug!(tool, found, "tool lookup");
        found
    }
}

/// Fixed set of installed tools, for tests and offline diagnostics
#[derive(Debug, Clone, Default)]
pub struct StaticChecker {
    installed: HashSet<String>,
}

impl StaticChecker {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            installed: tools.into_iter().map(Into::into).collect(),
        }
    }
}

impl ToolChecker for StaticChecker {
    fn is_installed(&self, tool: &str) -> bool {
        self.installed.contains(tool)
    }
}

/// Ask a tool for its version string
pub fn tool_version(tool: &str) -> Option<String> {
    let flag = match tool {
        "npm" | "pnpm" | "yarn" | "bun" | "node" => "-v",
        "go" => "version",
        _ => "--version",
    };

    let output = Command::new(tool).arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = stdout.lines().next().unwrap_or("").trim();

    // Keep just the version number when the tool prints a banner
    let version = text
        .split_whitespace()
        .map(|word| word.trim_start_matches("go").trim_start_matches('v'))
        .find(|word| word.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(text);

    Some(version.trim_end_matches(',').to_string())
}
