//! Single-directory runner detection
//!
//! A probe lists one directory once and evaluates every catalog entry
//! against that listing. Recursion is the resolver's job.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{catalog, Ecosystem, RunnerDefinition};

/// A runner whose required markers were all found in a directory
#[derive(Debug, Clone)]
pub struct RunnerMatch {
    pub definition: &'static RunnerDefinition,
    /// Files that satisfied the required markers, in marker order
    pub evidence: Vec<String>,
    /// Lockfile that backs this match, if one was found
    pub lockfile: Option<String>,
}

impl RunnerMatch {
    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.definition.ecosystem
    }

    /// Most specific evidence: the lockfile when there is one
    pub fn detected_file(&self) -> &str {
        self.lockfile
            .as_deref()
            .or_else(|| self.evidence.first().map(String::as_str))
            .unwrap_or("")
    }
}

/// Files and runner matches of one directory. Immutable once built.
#[derive(Debug)]
pub struct DirectorySnapshot {
    pub path: PathBuf,
    pub files: BTreeSet<String>,
    pub matches: Vec<RunnerMatch>,
}

impl DirectorySnapshot {
    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }
}

/// Probe `dir` against the catalog.
///
/// An unreadable directory produces an empty snapshot.
pub fn probe(dir: &Path) -> DirectorySnapshot {
    let files = list_files(dir);
    let matches = match_runners(catalog(), &files);

    debug!(
        dir = %dir.display(),
        files = files.len(),
        matches = ?matches.iter().map(RunnerMatch::name).collect::<Vec<_>>(),
        "probed directory"
    );

    DirectorySnapshot {
        path: dir.to_path_buf(),
        files,
        matches,
    }
}

/// Evaluate definitions in order against a directory listing
pub fn match_runners(
    definitions: &'static [RunnerDefinition],
    files: &BTreeSet<String>,
) -> Vec<RunnerMatch> {
    let names = files.iter().map(String::as_str);
    let mut matches = Vec::new();

    'definitions: for definition in definitions {
        let mut evidence = Vec::new();
        let mut lockfile = None;

        for marker in definition.markers {
            match marker.find(names.clone()) {
                Some(found) => {
                    if marker.lockfile {
                        lockfile.get_or_insert_with(|| found.to_string());
                    }
                    if marker.required {
                        evidence.push(found.to_string());
                    }
                }
                None if marker.required => continue 'definitions,
                None => {}
            }
        }

        matches.push(RunnerMatch {
            definition,
            evidence,
            lockfile,
        });
    }

    matches
}

/// Names of regular files in `dir`.
///
/// Symlinks count only when they resolve to a file inside `dir`.
fn list_files(dir: &Path) -> BTreeSet<String> {
    let mut files = BTreeSet::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), err = %e, "cannot read directory");
            return files;
        }
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        let keep = if file_type.is_symlink() {
            symlink_stays_inside(dir, &entry.path())
        } else {
            file_type.is_file()
        };

        if keep {
            if let Some(name) = entry.file_name().to_str() {
                files.insert(name.to_string());
            }
        }
    }

    files
}

fn symlink_stays_inside(dir: &Path, link: &Path) -> bool {
    let Ok(target) = fs::canonicalize(link) else {
        return false;
    };
    let root = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    target.starts_with(&root) && target.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn names(snapshot: &DirectorySnapshot) -> Vec<&'static str> {
        snapshot.matches.iter().map(RunnerMatch::name).collect()
    }

    #[test]
    fn test_probe_cargo() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("Cargo.toml")).unwrap();
        File::create(dir.path().join("Cargo.lock")).unwrap();

        let snapshot = probe(dir.path());
        assert_eq!(names(&snapshot), vec!["cargo"]);
        assert_eq!(snapshot.matches[0].lockfile.as_deref(), Some("Cargo.lock"));
        assert_eq!(snapshot.matches[0].detected_file(), "Cargo.lock");
    }

    #[test]
    fn test_required_markers_all_needed() {
        let dir = tempdir().unwrap();
        // A lockfile without its manifest is not a project
        File::create(dir.path().join("yarn.lock")).unwrap();

        assert!(probe(dir.path()).matches.is_empty());
    }

    #[test]
    fn test_optional_marker_refines_only() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("package.json")).unwrap();

        let snapshot = probe(dir.path());
        assert_eq!(names(&snapshot), vec!["npm"]);
        assert!(snapshot.matches[0].lockfile.is_none());
        assert_eq!(snapshot.matches[0].detected_file(), "package.json");
    }

    #[test]
    fn test_matches_keep_catalog_order() {
        let dir = tempdir().unwrap();
        for f in ["Makefile", "package.json", "yarn.lock", "Cargo.toml"] {
            File::create(dir.path().join(f)).unwrap();
        }

        let snapshot = probe(dir.path());
        assert_eq!(names(&snapshot), vec!["yarn", "npm", "cargo", "make"]);
    }

    #[test]
    fn test_makefile_lowercase() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("makefile")).unwrap();

        let snapshot = probe(dir.path());
        assert_eq!(names(&snapshot), vec!["make"]);
        assert_eq!(snapshot.matches[0].detected_file(), "makefile");
    }

    #[test]
    fn test_dotnet_suffix_marker() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("Service.csproj")).unwrap();

        assert_eq!(names(&probe(dir.path())), vec!["dotnet"]);
    }

    #[test]
    fn test_directories_are_not_markers() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Makefile")).unwrap();

        assert!(probe(dir.path()).matches.is_empty());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let snapshot = probe(&dir.path().join("gone"));
        assert!(snapshot.files.is_empty());
        assert!(snapshot.matches.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_directory_ignored() {
        let outside = tempdir().unwrap();
        let dir = tempdir().unwrap();
        File::create(outside.path().join("go.mod")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("go.mod"), dir.path().join("go.mod"))
            .unwrap();

        assert!(probe(dir.path()).matches.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_directory_counts() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("real.mod")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.mod"), dir.path().join("go.mod"))
            .unwrap();

        assert_eq!(names(&probe(dir.path())), vec!["go"]);
    }
}
