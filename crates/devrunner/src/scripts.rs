//! Script discovery for `list`, `doctor` and script-name checks

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::catalog::Ecosystem;

/// A named command a project defines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub command: String,
}

/// Scripts from one source file
#[derive(Debug, Clone)]
pub struct ScriptList {
    pub source: &'static str,
    pub scripts: Vec<Script>,
}

impl ScriptList {
    pub fn names(&self) -> Vec<&str> {
        self.scripts.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Subcommands every cargo project has
const CARGO_COMMANDS: &[&str] = &["build", "test", "run", "check", "clippy", "fmt", "doc", "bench"];

/// Scripts relevant to a runner of `ecosystem` in `dir`
pub fn for_ecosystem(ecosystem: Ecosystem, dir: &Path) -> Option<ScriptList> {
    match ecosystem {
        Ecosystem::Node => package_json(dir),
        Ecosystem::Python => pyproject(dir),
        Ecosystem::Rust => cargo(dir),
        Ecosystem::Make => makefile(dir),
        _ => None,
    }
}

/// Every script source present in `dir`
pub fn discover_all(dir: &Path) -> Vec<ScriptList> {
    [package_json(dir), pyproject(dir), cargo(dir), makefile(dir)]
        .into_iter()
        .flatten()
        .collect()
}

/// `scripts` object of package.json
pub fn package_json(dir: &Path) -> Option<ScriptList> {
    let content = read(dir, "package.json")?;
    let json: Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(e) => {
            debug!(err = %e, "unparseable package.json");
            return None;
        }
    };

    let scripts = json
        .get("scripts")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(name, cmd)| Script {
                    name: name.clone(),
                    command: cmd.as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ScriptList {
        source: "package.json",
        scripts,
    })
}

/// `[tool.poetry.scripts]` and `[project.scripts]` of pyproject.toml
pub fn pyproject(dir: &Path) -> Option<ScriptList> {
    let content = read(dir, "pyproject.toml")?;
    let doc: toml::Value = match toml::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(err = %e, "unparseable pyproject.toml");
            return None;
        }
    };

    let tables = [
        doc.get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.get("scripts")),
        doc.get("project").and_then(|p| p.get("scripts")),
    ];

    let scripts: Vec<Script> = tables
        .into_iter()
        .flatten()
        .filter_map(toml::Value::as_table)
        .flat_map(|table| table.iter())
        .map(|(name, target)| Script {
            name: name.clone(),
            command: target.as_str().unwrap_or_default().to_string(),
        })
        .collect();

    if scripts.is_empty() {
        return None;
    }
    Some(ScriptList {
        source: "pyproject.toml",
        scripts,
    })
}

/// Fixed cargo subcommands, when there is a Cargo.toml
pub fn cargo(dir: &Path) -> Option<ScriptList> {
    if !dir.join("Cargo.toml").is_file() {
        return None;
    }

    Some(ScriptList {
        source: "Cargo.toml",
        scripts: CARGO_COMMANDS
            .iter()
            .map(|cmd| Script {
                name: cmd.to_string(),
                command: format!("cargo {cmd}"),
            })
            .collect(),
    })
}

/// Explicit targets of the first Makefile found
pub fn makefile(dir: &Path) -> Option<ScriptList> {
    let (source, content) = ["GNUmakefile", "Makefile", "makefile"]
        .into_iter()
        .find_map(|name| read(dir, name).map(|c| (name, c)))?;

    let scripts: Vec<Script> = make_targets(&content)
        .into_iter()
        .map(|target| Script {
            command: format!("make {target}"),
            name: target,
        })
        .collect();

    if scripts.is_empty() {
        return None;
    }
    Some(ScriptList { source, scripts })
}

/// Rule targets in definition order, without special, pattern or
/// variable-assignment lines
fn make_targets(content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();

    for line in content.lines() {
        if line.starts_with(['\t', ' ', '#']) {
            continue;
        }
        let Some((head, rest)) = line.split_once(':') else {
            continue;
        };
        // `X := y`, `X ::= y`
        if rest.starts_with('=') || rest.starts_with(":=") || head.contains('=') {
            continue;
        }

        for target in head.split_whitespace() {
            if target.starts_with('.') || target.contains(['$', '%']) {
                continue;
            }
            if seen.insert(target.to_string()) {
                targets.push(target.to_string());
            }
        }
    }

    targets
}

fn read(dir: &Path, name: &str) -> Option<String> {
    let path = dir.join(name);
    if !path.is_file() {
        return None;
    }
    fs::read_to_string(&path)
        .map_err(|e| debug!(path = %path.display(), err = %e, "cannot read script source"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_package_json_scripts() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "app", "scripts": {"dev": "vite", "build": "vite build", "test": "vitest"}}"#,
        )
        .unwrap();

        let list = package_json(dir.path()).unwrap();
        assert_eq!(list.source, "package.json");
        assert_eq!(list.names(), vec!["build", "dev", "test"]);
        assert_eq!(list.scripts[0].command, "vite build");
    }

    #[test]
    fn test_package_json_without_scripts_is_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();

        assert!(package_json(dir.path()).unwrap().scripts.is_empty());
    }

    #[test]
    fn test_pyproject_scripts() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            r#"
[project]
name = "app"

[project.scripts]
serve = "app.server:main"

[tool.poetry.scripts]
lint = "app.tasks:lint"
"#,
        )
        .unwrap();

        let list = pyproject(dir.path()).unwrap();
        assert_eq!(list.names(), vec!["lint", "serve"]);
    }

    #[test]
    fn test_cargo_commands() {
        let dir = tempdir().unwrap();
        assert!(cargo(dir.path()).is_none());

        fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        let list = cargo(dir.path()).unwrap();
        assert!(list.names().contains(&"clippy"));
    }

    #[test]
    fn test_makefile_targets() {
        let content = "\
CC := gcc
VERSION = 1.0
.PHONY: all clean

all: build test

build:
\t$(CC) main.c

test lint: build
\t./run

%.o: %.c
\t$(CC) -c $<

# comment: not a target
clean:
\trm -rf out
";
        assert_eq!(
            make_targets(content),
            vec!["all", "build", "test", "lint", "clean"]
        );
    }

    #[test]
    fn test_discover_all() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"scripts": {"x": "y"}}"#).unwrap();
        fs::write(dir.path().join("Makefile"), "all:\n\techo\n").unwrap();

        let sources: Vec<&str> = discover_all(dir.path()).iter().map(|l| l.source).collect();
        assert_eq!(sources, vec!["package.json", "Makefile"]);
    }

    #[test]
    fn test_for_ecosystem() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module x").unwrap();
        assert!(for_ecosystem(Ecosystem::Go, dir.path()).is_none());
    }
}
