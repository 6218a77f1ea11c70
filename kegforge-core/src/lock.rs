//! Per-formula advisory locks. Real OS file locks, not an in-process
//! mutex, so two separate `kegforge` process invocations against the same
//! prefix serialize correctly, using `fs4`'s exclusive-lock support.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use kegforge_common::config::Config;

use crate::error::{InstallError, Result};

/// A held exclusive lock on one formula. Released when dropped.
pub struct FormulaLock {
    pub name: String,
    file: File,
}

impl Drop for FormulaLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn locks_dir(config: &Config) -> PathBuf {
    config.cache_dir().join("locks")
}

/// Acquires an exclusive lock on `name`, blocking until available.
pub fn acquire(config: &Config, name: &str) -> Result<FormulaLock> {
    let dir = locks_dir(config);
    fs::create_dir_all(&dir).map_err(kegforge_common::error::KfError::from)?;
    let path = dir.join(format!("{name}.lock"));
    let file = File::create(&path).map_err(kegforge_common::error::KfError::from)?;
    file.lock_exclusive()
        .map_err(|_| InstallError::LockFailed(name.to_string()))?;
    Ok(FormulaLock {
        name: name.to_string(),
        file,
    })
}

/// Acquires locks for `names` in the given (already-deduplicated, stable)
/// order. On failure partway through, locks acquired so far are released
/// (via `Drop`) before the error propagates, so a partially-locked set
/// never outlives a failed acquisition.
pub fn acquire_all(config: &Config, names: &[String]) -> Result<Vec<FormulaLock>> {
    let mut held = Vec::with_capacity(names.len());
    for name in names {
        held.push(acquire(config, name)?);
    }
    Ok(held)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> Config {
        Config {
            prefix: dir.join("prefix"),
            cellar: dir.join("prefix/Cellar"),
            taps_dir: dir.join("prefix/Library/Taps"),
            cache_dir: dir.join("cache"),
            no_emoji: true,
            install_badge: None,
        }
    }

    #[test]
    fn acquires_and_releases_distinct_locks() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let a = acquire(&config, "alpha").unwrap();
        let b = acquire(&config, "beta").unwrap();
        assert_eq!(a.name, "alpha");
        assert_eq!(b.name, "beta");
    }

    #[test]
    fn reacquiring_after_drop_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        {
            let _lock = acquire(&config, "gamma").unwrap();
        }
        let _lock2 = acquire(&config, "gamma").unwrap();
    }
}
