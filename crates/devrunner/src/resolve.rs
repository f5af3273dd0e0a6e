//! Upward search and runner selection
//!
//! Starting at the working directory, each level is probed (through the
//! cache) until some runner survives the ignore list. Within the winning
//! directory the first ecosystem in catalog order wins; competing tools of
//! that ecosystem are settled by lockfiles and, failing that, by which of
//! them are installed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use devrunner_core::ToolChecker;
use tracing::debug;

use crate::cache::SearchCache;
use crate::catalog::Ecosystem;
use crate::error::RunError;
use crate::probe::{DirectorySnapshot, RunnerMatch};

/// Search budget and exclusions, already merged from config and flags
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Parent directories to climb; 0 means the start directory only
    pub levels: u8,
    /// Tool or ecosystem names to treat as absent
    pub ignore: Vec<String>,
}

impl SearchOptions {
    /// Matches the tool name or its ecosystem (`node`, `golang`, ...),
    /// ignoring case
    pub fn is_ignored(&self, runner: &RunnerMatch) -> bool {
        self.ignore.iter().any(|name| {
            name.eq_ignore_ascii_case(runner.name())
                || Ecosystem::from_name(name) == Some(runner.ecosystem())
        })
    }
}

/// Non-fatal note: one tool was picked over other lockfiles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub chosen: String,
    pub superseded: Vec<String>,
}

/// Outcome of a successful search
#[derive(Debug, Clone)]
pub struct Resolution {
    pub runner: RunnerMatch,
    /// Directory the runner was found in; commands run here
    pub directory: PathBuf,
    /// How many parents above the start directory
    pub level: u8,
    pub advisory: Option<Advisory>,
    /// Other usable matches in the same directory, in catalog order
    pub alternatives: Vec<RunnerMatch>,
    /// Matches in the same directory dropped by the ignore list
    pub ignored: Vec<RunnerMatch>,
}

/// Directory where the search stopped, before any tool is chosen
#[derive(Debug, Clone)]
pub struct Located {
    pub directory: PathBuf,
    pub level: u8,
    pub snapshot: Arc<DirectorySnapshot>,
    /// Matches surviving the ignore list, in catalog order; never empty
    pub candidates: Vec<RunnerMatch>,
    pub ignored: Vec<RunnerMatch>,
}

/// Explicit state for one run: the probe cache and the tool lookup
pub struct ResolveContext {
    cache: SearchCache,
    checker: Box<dyn ToolChecker>,
}

impl ResolveContext {
    pub fn new(checker: Box<dyn ToolChecker>) -> Self {
        Self {
            cache: SearchCache::new(),
            checker,
        }
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    /// Find the first directory, climbing at most `options.levels`
    /// parents, with a runner that survives the ignore list
    pub fn locate(&mut self, start: &Path, options: &SearchOptions) -> Result<Located, RunError> {
        let start = fs::canonicalize(start)?;
        let mut dir: &Path = &start;
        let mut level: u8 = 0;

        loop {
            let snapshot = self.cache.snapshot(dir);
            let (kept, ignored): (Vec<RunnerMatch>, Vec<RunnerMatch>) = snapshot
                .matches
                .iter()
                .cloned()
                .partition(|m| !options.is_ignored(m));

            if !ignored.is_empty() {
                debug!(
                    dir = %dir.display(),
                    ignored = ?ignored.iter().map(RunnerMatch::name).collect::<Vec<_>>(),
                    "dropped ignored runners"
                );
            }

            if !kept.is_empty() {
                return Ok(Located {
                    directory: dir.to_path_buf(),
                    level,
                    snapshot,
                    candidates: kept,
                    ignored,
                });
            }

            if level >= options.levels {
                break;
            }
            match dir.parent() {
                Some(parent) => {
                    dir = parent;
                    level += 1;
                }
                None => break,
            }
        }

        Err(RunError::NotFound {
            start: start.clone(),
            levels: options.levels,
        })
    }

    /// Find the runner for `start`: [`locate`](Self::locate), then settle
    /// competing tools
    pub fn resolve(&mut self, start: &Path, options: &SearchOptions) -> Result<Resolution, RunError> {
        let located = self.locate(start, options)?;
        let (runner, advisory) = self.choose(&located.candidates)?;
        debug!(
            runner = runner.name(),
            dir = %located.directory.display(),
            level = located.level,
            "resolved runner"
        );

        let alternatives = located
            .candidates
            .into_iter()
            .filter(|m| m.name() != runner.name())
            .collect();

        Ok(Resolution {
            runner,
            directory: located.directory,
            level: located.level,
            advisory,
            alternatives,
            ignored: located.ignored,
        })
    }

    /// Pick one runner among the matches of a single directory.
    ///
    /// The first ecosystem in catalog order wins outright; tools inside it
    /// are settled by lockfiles, then by what is installed.
    pub fn choose(&self, matches: &[RunnerMatch]) -> Result<(RunnerMatch, Option<Advisory>), RunError> {
        let Some(first) = matches.first() else {
            return Err(RunError::NoCandidates);
        };
        let ecosystem = first.ecosystem();
        let mut group: Vec<&RunnerMatch> = matches
            .iter()
            .filter(|m| m.ecosystem() == ecosystem)
            .collect();

        // A lockfile beats a bare manifest fallback
        if group.iter().any(|m| m.lockfile.is_some()) {
            group.retain(|m| m.lockfile.is_some());
        }

        if let [only] = group.as_slice() {
            return Ok(((*only).clone(), None));
        }

        let installed: Vec<&RunnerMatch> = group
            .iter()
            .copied()
            .filter(|m| self.checker.is_installed(m.definition.executable()))
            .collect();

        debug!(
            %ecosystem,
            candidates = ?group.iter().map(|m| m.name()).collect::<Vec<_>>(),
            installed = ?installed.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "settling same-ecosystem conflict"
        );

        match installed.as_slice() {
            [] => {
                let preferred = group[0];
                let found: Vec<String> = group.iter().map(|m| m.detected_file().to_string()).collect();
                Err(RunError::ToolMissing {
                    tool: preferred.name().to_string(),
                    hint: Some(format!(
                        "Found {} for {} but none of {} is installed. Install {} to continue.",
                        found.join(", "),
                        ecosystem,
                        group.iter().map(|m| m.name()).collect::<Vec<_>>().join(", "),
                        preferred.name()
                    )),
                })
            }
            [chosen] => {
                let superseded = group
                    .iter()
                    .filter(|m| m.name() != chosen.name())
                    .map(|m| m.detected_file().to_string())
                    .collect();
                Ok((
                    (*chosen).clone(),
                    Some(Advisory {
                        chosen: chosen.name().to_string(),
                        superseded,
                    }),
                ))
            }
            several => Err(RunError::Conflict {
                ecosystem,
                tools: several.iter().map(|m| m.name().to_string()).collect(),
                lockfiles: several.iter().map(|m| m.detected_file().to_string()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devrunner_core::StaticChecker;
    use std::fs::File;
    use tempfile::{tempdir, TempDir};

    fn context(installed: &[&str]) -> ResolveContext {
        ResolveContext::new(Box::new(StaticChecker::new(installed.iter().copied())))
    }

    fn options(levels: u8) -> SearchOptions {
        SearchOptions {
            levels,
            ignore: Vec::new(),
        }
    }

    fn project(files: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for f in files {
            File::create(dir.path().join(f)).unwrap();
        }
        dir
    }

    /// root/a/b/c with `files` created in root
    fn nested(files: &[&str]) -> (TempDir, PathBuf) {
        let root = project(files);
        let leaf = root.path().join("a").join("b").join("c");
        fs::create_dir_all(&leaf).unwrap();
        (root, leaf)
    }

    #[test]
    fn test_cargo_resolves_at_level_zero() {
        let dir = project(&["Cargo.toml", "Cargo.lock"]);

        for levels in [0, 3, 10] {
            let mut ctx = context(&[]);
            let resolution = ctx.resolve(dir.path(), &options(levels)).unwrap();
            assert_eq!(resolution.runner.name(), "cargo");
            assert_eq!(resolution.level, 0);
            assert_eq!(ctx.cache().probe_count(), 1);
        }
    }

    #[test]
    fn test_climbs_to_parent() {
        let (root, leaf) = nested(&["go.mod"]);
        let mut ctx = context(&[]);

        let resolution = ctx.resolve(&leaf, &options(3)).unwrap();
        assert_eq!(resolution.runner.name(), "go");
        assert_eq!(resolution.level, 3);
        assert_eq!(resolution.directory, fs::canonicalize(root.path()).unwrap());
    }

    #[test]
    fn test_budget_limits_inspected_directories() {
        let (_root, leaf) = nested(&["go.mod"]);

        for levels in 0..3u8 {
            let mut ctx = context(&[]);
            let err = ctx.resolve(&leaf, &options(levels)).unwrap_err();
            assert!(matches!(err, RunError::NotFound { levels: l, .. } if l == levels));
            assert_eq!(ctx.cache().probe_count(), levels as usize + 1);
        }
    }

    #[test]
    fn test_directories_probed_once_across_searches() {
        let (_root, leaf) = nested(&["Cargo.toml"]);
        let mut ctx = context(&[]);

        ctx.resolve(&leaf, &options(3)).unwrap();
        assert_eq!(ctx.cache().probe_count(), 4);

        ctx.resolve(&leaf, &options(3)).unwrap();
        ctx.resolve(leaf.parent().unwrap(), &options(3)).unwrap();
        assert_eq!(ctx.cache().probe_count(), 4);
    }

    #[test]
    fn test_lockfile_conflict_one_installed() {
        let dir = project(&["package.json", "package-lock.json", "yarn.lock"]);
        let mut ctx = context(&["npm"]);

        let resolution = ctx.resolve(dir.path(), &options(0)).unwrap();
        assert_eq!(resolution.runner.name(), "npm");
        assert_eq!(
            resolution.advisory,
            Some(Advisory {
                chosen: "npm".to_string(),
                superseded: vec!["yarn.lock".to_string()],
            })
        );
    }

    #[test]
    fn test_lockfile_conflict_both_installed() {
        let dir = project(&["package.json", "package-lock.json", "yarn.lock"]);
        let mut ctx = context(&["npm", "yarn"]);

        match ctx.resolve(dir.path(), &options(0)).unwrap_err() {
            RunError::Conflict {
                ecosystem,
                tools,
                lockfiles,
            } => {
                assert_eq!(ecosystem, Ecosystem::Node);
                assert_eq!(tools, vec!["yarn", "npm"]);
                assert_eq!(lockfiles, vec!["yarn.lock", "package-lock.json"]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_lockfile_conflict_none_installed() {
        let dir = project(&["package.json", "package-lock.json", "yarn.lock"]);
        let mut ctx = context(&[]);

        let err = ctx.resolve(dir.path(), &options(0)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_codes::TOOL_NOT_INSTALLED);
        match err {
            RunError::ToolMissing { tool, hint } => {
                assert_eq!(tool, "yarn");
                assert!(hint.unwrap().contains("Install yarn"));
            }
            other => panic!("expected tool missing, got {other:?}"),
        }
    }

    #[test]
    fn test_single_lockfile_skips_tool_check() {
        let dir = project(&["package.json", "yarn.lock"]);
        // Nothing installed: a lone lockfile still decides
        let mut ctx = context(&[]);

        let resolution = ctx.resolve(dir.path(), &options(0)).unwrap();
        assert_eq!(resolution.runner.name(), "yarn");
        assert!(resolution.advisory.is_none());
    }

    #[test]
    fn test_cross_ecosystem_catalog_order_wins() {
        let dir = project(&["package.json", "Makefile"]);
        let mut ctx = context(&["npm", "make"]);

        let resolution = ctx.resolve(dir.path(), &options(0)).unwrap();
        assert_eq!(resolution.runner.name(), "npm");
        assert!(resolution.advisory.is_none());
        assert_eq!(
            resolution.alternatives.iter().map(|m| m.name()).collect::<Vec<_>>(),
            vec!["make"]
        );

        let dir = project(&["go.mod", "Cargo.toml", "pyproject.toml"]);
        let resolution = context(&[]).resolve(dir.path(), &options(0)).unwrap();
        assert_eq!(resolution.runner.name(), "pip");
    }

    #[test]
    fn test_ignored_tool_treated_as_absent() {
        let dir = project(&["package.json", "Makefile"]);
        let mut ctx = context(&[]);
        let opts = SearchOptions {
            levels: 0,
            ignore: vec!["NPM".to_string()],
        };

        let resolution = ctx.resolve(dir.path(), &opts).unwrap();
        assert_eq!(resolution.runner.name(), "make");
        assert_eq!(resolution.ignored.len(), 1);
        assert_eq!(resolution.ignored[0].name(), "npm");
    }

    #[test]
    fn test_ignore_settles_conflict() {
        let dir = project(&["package.json", "package-lock.json", "yarn.lock"]);
        let mut ctx = context(&["npm", "yarn"]);
        let opts = SearchOptions {
            levels: 0,
            ignore: vec!["yarn".to_string()],
        };

        let resolution = ctx.resolve(dir.path(), &opts).unwrap();
        assert_eq!(resolution.runner.name(), "npm");
        assert!(resolution.advisory.is_none());
    }

    #[test]
    fn test_ignored_ecosystem_climbs_further() {
        let (root, leaf) = nested(&["Makefile"]);
        File::create(leaf.join("package.json")).unwrap();
        let mut ctx = context(&[]);
        let opts = SearchOptions {
            levels: 3,
            ignore: vec!["NodeJS".to_string()],
        };

        let resolution = ctx.resolve(&leaf, &opts).unwrap();
        assert_eq!(resolution.runner.name(), "make");
        assert_eq!(resolution.directory, fs::canonicalize(root.path()).unwrap());
    }

    #[test]
    fn test_unlocked_conflict_consults_installed_tools() {
        let dir = project(&["build.gradle", "pom.xml"]);

        let resolution = context(&["mvn"]).resolve(dir.path(), &options(0)).unwrap();
        assert_eq!(resolution.runner.name(), "maven");
        assert_eq!(resolution.advisory.unwrap().superseded, vec!["build.gradle"]);

        let err = context(&["mvn", "gradle"])
            .resolve(dir.path(), &options(0))
            .unwrap_err();
        assert!(matches!(err, RunError::Conflict { .. }));
    }

    #[test]
    fn test_locate_keeps_conflicting_candidates() {
        let dir = project(&["package.json", "package-lock.json", "yarn.lock"]);
        let mut ctx = context(&["npm", "yarn"]);

        let located = ctx.locate(dir.path(), &options(0)).unwrap();
        assert_eq!(
            located.candidates.iter().map(|m| m.name()).collect::<Vec<_>>(),
            vec!["yarn", "npm"]
        );
        assert!(located.snapshot.has_file("yarn.lock"));
        assert!(ctx.choose(&located.candidates).is_err());
    }

    #[test]
    fn test_choose_without_candidates() {
        let err = context(&["npm"]).choose(&[]).unwrap_err();
        assert!(matches!(err, RunError::NoCandidates));
        assert_eq!(err.exit_code(), crate::error::exit_codes::RUNNER_NOT_FOUND);
    }

    #[test]
    fn test_missing_start_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let err = context(&[])
            .resolve(&dir.path().join("nope"), &options(0))
            .unwrap_err();
        assert!(matches!(err, RunError::Io(_)));
    }
}
