//! Per-run memo of directory probes

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::probe::{probe, DirectorySnapshot};

/// Probe results keyed by canonical directory path.
///
/// Lives for one process run; nothing is written to disk.
#[derive(Debug, Default)]
pub struct SearchCache {
    entries: HashMap<PathBuf, Arc<DirectorySnapshot>>,
    probes: usize,
}

impl SearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for `dir`, probing it on first use only
    pub fn snapshot(&mut self, dir: &Path) -> Arc<DirectorySnapshot> {
        let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());

        if let Some(hit) = self.entries.get(&key) {
            return Arc::clone(hit);
        }

        self.probes += 1;
        let snapshot = Arc::new(probe(&key));
        self.entries.insert(key, Arc::clone(&snapshot));
        snapshot
    }

    /// Number of directories actually probed
    pub fn probe_count(&self) -> usize {
        self.probes
    }
}
