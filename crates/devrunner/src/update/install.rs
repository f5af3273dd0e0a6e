//! Checksum verification and atomic binary replacement

use std::io::{self, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::Builder;

use super::UpdateError;

/// Compare the SHA-256 of `bytes` with a published hex digest
pub fn verify(bytes: &[u8], expected: &str) -> Result<(), UpdateError> {
    let actual = hex::encode(Sha256::digest(bytes));

    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(UpdateError::ChecksumMismatch {
            expected: expected.trim().to_string(),
            actual,
        })
    }
}

/// Replace `target` with `bytes`.
///
/// The new binary is staged next to the target and renamed over it, so a
/// failure at any point leaves the old binary in place and no temp file
/// behind.
pub fn swap(target: &Path, bytes: &[u8]) -> Result<(), UpdateError> {
    let dir = target.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} has no parent directory", target.display()),
        )
    })?;

    let mut staged = Builder::new().prefix(".devrunner-update-").tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::fs::{self, Permissions};
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), Permissions::from_mode(0o755))?;
    }

    staged.persist(target).map_err(|e| UpdateError::Io(e.error))?;
    Ok(())
}
