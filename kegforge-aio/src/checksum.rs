// kegforge-aio/src/checksum.rs
use std::path::Path;

use kegforge_common::error::{KfError, Result};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Asynchronously verifies the SHA256 checksum of a file. Reads the file
/// asynchronously but performs hashing synchronously.
pub async fn verify_checksum_async(path: &Path, expected: &str) -> Result<()> {
    debug!("Async Verifying checksum for: {}", path.display());
    let mut file = File::open(path).await.map_err(KfError::from)?;

    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(8192);
    let mut total_bytes_read = 0;

    loop {
        buffer.clear();
        match file.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
                total_bytes_read += n as u64;
            }
            Err(e) => return Err(KfError::from(e)),
        }
    }

    let actual = hex::encode(hasher.finalize());

    debug!(
        "Async Calculated SHA256: {} ({} bytes read)",
        actual, total_bytes_read
    );
    debug!("Expected SHA256:   {}", expected);

    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(KfError::ChecksumMismatch(format!(
            "{}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}

pub fn verify_checksum_sync(path: &Path, expected: &str) -> Result<()> {
    debug!("Sync Verifying checksum for: {}", path.display());
    let std_file = std::fs::File::open(path).map_err(KfError::from)?;
    let mut std_reader = std::io::BufReader::new(std_file);
    let mut hasher = Sha256::new();
    let bytes_copied = std::io::copy(&mut std_reader, &mut hasher).map_err(KfError::from)?;
    let actual = hex::encode(hasher.finalize());

    debug!(
        "Sync Calculated SHA256: {} ({} bytes read)",
        actual, bytes_copied
    );
    debug!("Expected SHA256:   {}", expected);

    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(KfError::ChecksumMismatch(format!(
            "{}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}
