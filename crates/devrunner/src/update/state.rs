//! Update record and background-check throttle

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::UpdateError;

/// How long an update notification stays relevant, and the background
/// check interval
pub fn freshness_window() -> Duration {
    Duration::hours(24)
}

/// Written after a successful swap, shown once on the next start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    pub previous_version: String,
    pub new_version: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub release_url: Option<String>,
}

impl UpdateState {
    pub fn save(&self, path: &Path) -> Result<(), UpdateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.updated_at) < freshness_window()
    }

    /// First few non-empty lines of the release notes
    pub fn highlights(&self, limit: usize) -> Vec<&str> {
        self.notes
            .as_deref()
            .unwrap_or("")
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(limit)
            .collect()
    }
}

/// Consume the pending update record.
///
/// The file is removed before anything else, so a record is never shown
/// twice. Missing, malformed or stale records yield `None`.
pub fn take_notification(path: &Path, now: DateTime<Utc>) -> Option<UpdateState> {
    let content = fs::read_to_string(path).ok()?;

    if let Err(e) = fs::remove_file(path) {
        debug!(path = %path.display(), err = %e, "could not remove update record");
    }

    let state: UpdateState = match serde_json::from_str(&content) {
        Ok(state) => state,
        Err(e) => {
            debug!(err = %e, "malformed update record");
            return None;
        }
    };

    state.is_fresh(now).then_some(state)
}

/// Whether a background check is due, per the last-check stamp
pub fn check_due(stamp: &Path, now: DateTime<Utc>) -> bool {
    let last = fs::read_to_string(stamp)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|t| t.with_timezone(&Utc));

    match last {
        Some(last) => now.signed_duration_since(last) >= freshness_window(),
        None => true,
    }
}

pub fn mark_checked(stamp: &Path, now: DateTime<Utc>) -> io::Result<()> {
    if let Some(parent) = stamp.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(stamp, now.to_rfc3339())
}
