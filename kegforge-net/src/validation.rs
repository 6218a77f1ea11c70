// URL and integrity validation primitives used before any bytes are
// written to disk.

use std::fs::File;
use std::io;
use std::path::Path;

use kegforge_common::error::{KfError, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Rejects anything that isn't `https://`, so a compromised mirror list
/// can't silently downgrade a download to plaintext.
pub fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str)
        .map_err(|e| KfError::ValidationError(format!("invalid URL '{url_str}': {e}")))?;
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(KfError::ValidationError(format!(
            "'{url_str}' must use https, got '{}'",
            url.scheme()
        )))
    }
}

/// Hashes `path` and compares against `expected` (case-insensitive hex).
/// An empty `expected` is treated as "no checksum supplied" and always
/// passes, so locally supplied archives without a known checksum aren't
/// rejected outright.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(KfError::ChecksumMismatch(format!(
            "{}: expected {expected}, got {actual}",
            path.display()
        )))
    }
}
