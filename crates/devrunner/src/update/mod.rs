//! Self-update
//!
//! A check walks `Idle → Checking → (UpToDate | Downloading → Verifying →
//! Swapping → Done)`; any failure lands in `Aborted`. Failures never reach
//! the user: they are swallowed here and visible only in debug logs.

pub mod feed;
pub mod install;
pub mod state;

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::Utc;
use devrunner_core::Paths;
use semver::Version;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use feed::{HttpSource, ReleaseSource};
use state::UpdateState;

/// Hidden flag the detached background process is started with
pub const INTERNAL_CHECK_FLAG: &str = "--internal-update-check";

/// Disables every update path when set (to anything but `0` or empty)
pub const NO_UPDATE_ENV: &str = "DEVRUNNER_NO_UPDATE";

pub const CHECK_TIMEOUT: Duration = Duration::from_secs(3);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid version {0:?}")]
    InvalidVersion(String),

    #[error("release has no asset named {0}")]
    NoAsset(String),

    #[error("release asset {0} has no sha256 digest")]
    MissingDigest(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("update record: {0}")]
    State(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
    UpToDate,
    Downloading,
    Verifying,
    Swapping,
    Done,
    Aborted,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    UpToDate { current: Version },
    Updated { from: Version, to: Version },
    Aborted(UpdateError),
}

/// One update attempt against a release source
pub struct Updater<S> {
    source: S,
    current: Version,
    /// Binary to replace
    target: PathBuf,
    /// Where the post-update record goes
    state_path: PathBuf,
    asset_name: String,
    check_timeout: Duration,
    download_timeout: Duration,
    phase: Phase,
}

impl<S: ReleaseSource> Updater<S> {
    pub fn new(source: S, current: Version, target: PathBuf, state_path: PathBuf) -> Self {
        Self {
            source,
            current,
            target,
            state_path,
            asset_name: feed::platform_asset_name(),
            check_timeout: CHECK_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
            phase: Phase::Idle,
        }
    }

    pub fn with_asset_name(mut self, name: impl Into<String>) -> Self {
        self.asset_name = name.into();
        self
    }

    pub fn with_timeouts(mut self, check: Duration, download: Duration) -> Self {
        self.check_timeout = check;
        self.download_timeout = download;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "update phase");
        self.phase = phase;
    }

    /// Run the state machine to a terminal phase
    pub async fn run(&mut self) -> UpdateOutcome {
        match self.attempt().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.enter(Phase::Aborted);
                debug!(err = %e, "update aborted");
                UpdateOutcome::Aborted(e)
            }
        }
    }

    async fn attempt(&mut self) -> Result<UpdateOutcome, UpdateError> {
        self.enter(Phase::Checking);
        let release = timeout(self.check_timeout, self.source.latest())
            .await
            .map_err(|_| UpdateError::Timeout(self.check_timeout))??;

        let remote = release.version()?;
        if remote <= self.current {
            self.enter(Phase::UpToDate);
            return Ok(UpdateOutcome::UpToDate {
                current: self.current.clone(),
            });
        }
        debug!(current = %self.current, remote = %remote, "newer release available");

        let asset = release
            .asset(&self.asset_name)
            .ok_or_else(|| UpdateError::NoAsset(self.asset_name.clone()))?;
        let expected = asset
            .sha256()
            .ok_or_else(|| UpdateError::MissingDigest(asset.name.clone()))?
            .to_string();

        self.enter(Phase::Downloading);
        let bytes = timeout(self.download_timeout, self.source.download(&asset.browser_download_url))
            .await
            .map_err(|_| UpdateError::Timeout(self.download_timeout))??;

        self.enter(Phase::Verifying);
        install::verify(&bytes, &expected)?;

        self.enter(Phase::Swapping);
        install::swap(&self.target, &bytes)?;

        self.enter(Phase::Done);
        let record = UpdateState {
            previous_version: self.current.to_string(),
            new_version: remote.to_string(),
            updated_at: Utc::now(),
            notes: release.body.clone(),
            release_url: release.html_url.clone(),
        };
        // The binary is already replaced; a lost record only loses the notice
        if let Err(e) = record.save(&self.state_path) {
            debug!(err = %e, "could not write update record");
        }

        Ok(UpdateOutcome::Updated {
            from: self.current.clone(),
            to: remote,
        })
    }
}

pub fn current_version() -> Result<Version, UpdateError> {
    feed::parse_version(env!("CARGO_PKG_VERSION"))
}

pub fn disabled_by_env() -> bool {
    env::var_os(NO_UPDATE_ENV).is_some_and(|v| !v.is_empty() && v != "0")
}

/// Check and apply an update against the real feed, blocking until done
pub fn check_now(paths: &Paths) -> UpdateOutcome {
    match build_and_run(paths) {
        Ok(outcome) => outcome,
        Err(e) => {
            debug!(err = %e, "update aborted before checking");
            UpdateOutcome::Aborted(e)
        }
    }
}

fn build_and_run(paths: &Paths) -> Result<UpdateOutcome, UpdateError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let source = HttpSource::new(feed::feed_url())?;
    let target = env::current_exe()?;

    let mut updater = Updater::new(source, current_version()?, target, paths.update_state());
    Ok(runtime.block_on(updater.run()))
}

/// Start a detached update check unless one ran recently.
///
/// The child is this binary with [`INTERNAL_CHECK_FLAG`], in its own process
/// group with all stdio closed. Nothing it does reaches the caller.
pub fn spawn_background(paths: &Paths) {
    let stamp = paths.last_update_check();
    let now = Utc::now();

    if !state::check_due(&stamp, now) {
        debug!("background update check skipped, checked recently");
        return;
    }
    if let Err(e) = state::mark_checked(&stamp, now) {
        debug!(err = %e, "could not write last-check stamp");
        return;
    }

    let exe = match env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            debug!(err = %e, "cannot locate own executable");
            return;
        }
    };

    let mut command = Command::new(exe);
    command
        .arg(INTERNAL_CHECK_FLAG)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    match command.spawn() {
        Ok(child) => debug!(pid = child.id(), "spawned background update check"),
        Err(e) => debug!(err = %e, "could not spawn background update check"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed::{Asset, Release};
    use sha2::{Digest, Sha256};
    use std::fs;
    use std::future::pending;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    const ASSET: &str = "devrunner-test-os";

    struct FakeSource {
        release: Option<Release>,
        bytes: Vec<u8>,
        downloads: AtomicUsize,
    }

    impl FakeSource {
        fn new(tag: &str, bytes: &[u8], digest: Option<String>) -> Self {
            Self {
                release: Some(Release {
                    tag_name: tag.to_string(),
                    body: Some("- new things".to_string()),
                    html_url: Some("https://example.com/release".to_string()),
                    assets: vec![Asset {
                        name: ASSET.to_string(),
                        browser_download_url: "https://example.com/asset".to_string(),
                        digest,
                    }],
                }),
                bytes: bytes.to_vec(),
                downloads: AtomicUsize::new(0),
            }
        }

        fn offline() -> Self {
            Self {
                release: None,
                bytes: Vec::new(),
                downloads: AtomicUsize::new(0),
            }
        }
    }

    impl ReleaseSource for FakeSource {
        async fn latest(&self) -> Result<Release, UpdateError> {
            self.release
                .clone()
                .ok_or_else(|| UpdateError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)))
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>, UpdateError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    /// Never answers
    struct HangingSource;

    impl ReleaseSource for HangingSource {
        async fn latest(&self) -> Result<Release, UpdateError> {
            pending().await
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>, UpdateError> {
            pending().await
        }
    }

    /// Announces a newer release, then never delivers the asset
    struct StalledDownload(FakeSource);

    impl ReleaseSource for StalledDownload {
        async fn latest(&self) -> Result<Release, UpdateError> {
            self.0.latest().await
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>, UpdateError> {
            pending().await
        }
    }

    fn sha(bytes: &[u8]) -> String {
        format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
    }

    struct Install {
        _root: TempDir,
        bin_dir: PathBuf,
        target: PathBuf,
        state: PathBuf,
    }

    fn install() -> Install {
        let root = tempdir().unwrap();
        let bin_dir = root.path().join("bin");
        fs::create_dir(&bin_dir).unwrap();
        let target = bin_dir.join("devrunner");
        fs::write(&target, b"old binary").unwrap();
        let state = root.path().join("data").join("update-state.json");
        Install {
            _root: root,
            bin_dir,
            target,
            state,
        }
    }

    fn updater<S: ReleaseSource>(source: S, install: &Install) -> Updater<S> {
        Updater::new(
            source,
            Version::new(0, 4, 0),
            install.target.clone(),
            install.state.clone(),
        )
        .with_asset_name(ASSET)
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_up_to_date() {
        let install = install();
        let source = FakeSource::new("v0.4.0", b"same", Some(sha(b"same")));
        let mut updater = updater(source, &install);

        let outcome = updater.run().await;

        assert!(matches!(outcome, UpdateOutcome::UpToDate { .. }));
        assert_eq!(updater.phase(), Phase::UpToDate);
        assert_eq!(updater.source.downloads.load(Ordering::SeqCst), 0);
        assert!(!install.state.exists());
    }

    #[tokio::test]
    async fn test_update_swaps_binary_and_records_state() {
        let install = install();
        let source = FakeSource::new("v0.5.0", b"new binary", Some(sha(b"new binary")));
        let mut updater = updater(source, &install);

        let outcome = updater.run().await;

        match outcome {
            UpdateOutcome::Updated { from, to } => {
                assert_eq!(from, Version::new(0, 4, 0));
                assert_eq!(to, Version::new(0, 5, 0));
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(updater.phase(), Phase::Done);
        assert_eq!(fs::read(&install.target).unwrap(), b"new binary");
        assert_eq!(entries(&install.bin_dir), 1);

        let record = state::take_notification(&install.state, Utc::now()).unwrap();
        assert_eq!(record.previous_version, "0.4.0");
        assert_eq!(record.new_version, "0.5.0");
        assert_eq!(record.release_url.as_deref(), Some("https://example.com/release"));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_leaves_binary_untouched() {
        let install = install();
        let source = FakeSource::new("v0.5.0", b"tampered", Some(sha(b"new binary")));
        let mut updater = updater(source, &install);

        let outcome = updater.run().await;

        assert!(matches!(
            outcome,
            UpdateOutcome::Aborted(UpdateError::ChecksumMismatch { .. })
        ));
        assert_eq!(updater.phase(), Phase::Aborted);
        assert_eq!(fs::read(&install.target).unwrap(), b"old binary");
        assert_eq!(entries(&install.bin_dir), 1);
        assert!(!install.state.exists());
    }

    #[tokio::test]
    async fn test_missing_digest_aborts_before_download() {
        let install = install();
        let source = FakeSource::new("v0.5.0", b"new binary", None);
        let mut updater = updater(source, &install);

        let outcome = updater.run().await;

        assert!(matches!(outcome, UpdateOutcome::Aborted(UpdateError::MissingDigest(_))));
        assert_eq!(updater.source.downloads.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read(&install.target).unwrap(), b"old binary");
    }

    #[tokio::test]
    async fn test_missing_platform_asset_aborts() {
        let install = install();
        let source = FakeSource::new("v0.5.0", b"new binary", Some(sha(b"new binary")));
        let mut updater = updater(source, &install).with_asset_name("devrunner-other-os");

        assert!(matches!(
            updater.run().await,
            UpdateOutcome::Aborted(UpdateError::NoAsset(_))
        ));
    }

    #[tokio::test]
    async fn test_feed_failure_aborts_quietly() {
        let install = install();
        let mut updater = updater(FakeSource::offline(), &install);

        assert!(matches!(updater.run().await, UpdateOutcome::Aborted(_)));
        assert_eq!(updater.phase(), Phase::Aborted);
        assert!(!install.state.exists());
    }

    #[tokio::test]
    async fn test_check_timeout_aborts() {
        let install = install();
        let mut updater = updater(HangingSource, &install)
            .with_timeouts(Duration::from_millis(20), Duration::from_millis(20));

        let outcome = updater.run().await;

        assert!(matches!(outcome, UpdateOutcome::Aborted(UpdateError::Timeout(_))));
        assert_eq!(fs::read(&install.target).unwrap(), b"old binary");
    }

    #[tokio::test]
    async fn test_download_timeout_leaves_install_untouched() {
        let install = install();
        let source = StalledDownload(FakeSource::new(
            "v0.5.0",
            b"new binary",
            Some(sha(b"new binary")),
        ));
        let download_timeout = Duration::from_millis(20);
        let mut updater = updater(source, &install)
            .with_timeouts(Duration::from_secs(1), download_timeout);

        let outcome = updater.run().await;

        match outcome {
            UpdateOutcome::Aborted(UpdateError::Timeout(after)) => {
                assert_eq!(after, download_timeout)
            }
            other => panic!("expected download timeout, got {other:?}"),
        }
        assert_eq!(updater.phase(), Phase::Aborted);
        assert_eq!(fs::read(&install.target).unwrap(), b"old binary");
        assert_eq!(entries(&install.bin_dir), 1);
        assert!(!install.state.exists());
    }

    #[test]
    fn test_current_version_parses() {
        assert!(current_version().is_ok());
    }
}
