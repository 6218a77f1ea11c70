//! Scoped-guard abstractions for the two rollback windows this crate
//! needs: the dependency-upgrade stash/restore dance and the
//! interrupt-masked prefix cleanup after a build failure. Neither guard
//! actually masks OS signals, the scheduling
//! model only requires that the filesystem transition complete
//! atomically from the user's perspective, which a single `rename` plus
//! no intervening suspension point already gives on a local filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use kegforge_common::error::KfError;
use kegforge_common::model::InstalledArtifact;

use crate::error::{InstallError, Result};

const LINKABLE_SUBDIRS: [&str; 5] = ["bin", "lib", "include", "share", "etc"];

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn classify(subdir: &str, link_path: PathBuf, target_path: PathBuf) -> InstalledArtifact {
    match subdir {
        "bin" => InstalledArtifact::BinaryLink {
            link_path,
            target_path,
        },
        "share" if link_path.to_string_lossy().contains("man") => InstalledArtifact::ManpageLink {
            link_path,
            target_path,
        },
        _ => InstalledArtifact::DirectoryLink {
            link_path,
            target_path,
        },
    }
}

/// Reconstructs which of `prefix`'s symlinks currently point into
/// `keg_path`, so they can be unlinked before the keg is stashed and
/// relinked if the stash is later restored. There is no persisted
/// artifact manifest to consult (the tab sidecar only records options),
/// so this walks the same subdirectories `kegforge_aio::link` populates
/// them from and checks which existing links already resolve here.
pub(crate) fn discover_linked_artifacts(
    name: &str,
    keg_path: &Path,
    prefix: &Path,
    opt_dir: &Path,
) -> Vec<InstalledArtifact> {
    let mut found = Vec::new();
    for subdir in LINKABLE_SUBDIRS {
        let source_dir = keg_path.join(subdir);
        if !source_dir.is_dir() {
            continue;
        }
        let target_dir = prefix.join(subdir);
        let Ok(entries) = fs::read_dir(&source_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let source_item = entry.path();
            let link_path = target_dir.join(entry.file_name());
            if fs::read_link(&link_path)
                .map(|existing| existing == source_item)
                .unwrap_or(false)
            {
                found.push(classify(subdir, link_path, source_item));
            }
        }
    }
    let opt_link = opt_dir.join(name);
    if fs::read_link(&opt_link)
        .map(|existing| existing == keg_path)
        .unwrap_or(false)
    {
        found.push(InstalledArtifact::OptLink {
            link_path: opt_link,
            target_path: keg_path.to_path_buf(),
        });
    }
    found
}

/// the stash/restore dance around one dependency's in-place
/// upgrade. `create` unlinks the dep's current keg and renames its
/// prefix to a sibling `.tmp` stash; the caller then builds/pours the
/// new version at the original path. Call `commit` on success or
/// `rollback` on failure, exactly one of the two, since both consume
/// `self`.
pub struct DependencyStash {
    name: String,
    original_prefix: PathBuf,
    stash_path: PathBuf,
    had_prefix: bool,
    linked_artifacts: Vec<InstalledArtifact>,
}

impl DependencyStash {
    pub fn create(name: &str, prefix: &Path, shared_prefix: &Path, opt_dir: &Path) -> Result<Self> {
        let had_prefix = prefix.is_dir();
        let linked_artifacts = if had_prefix {
            discover_linked_artifacts(name, prefix, shared_prefix, opt_dir)
        } else {
            Vec::new()
        };
        if !linked_artifacts.is_empty() {
            kegforge_aio::unlink(&linked_artifacts).map_err(InstallError::from)?;
        }
        let stash_path = sibling_tmp(prefix);
        if had_prefix {
            fs::rename(prefix, &stash_path).map_err(|e| InstallError::from(KfError::from(e)))?;
        }
        Ok(Self {
            name: name.to_string(),
            original_prefix: prefix.to_path_buf(),
            stash_path,
            had_prefix,
            linked_artifacts,
        })
    }

    pub fn was_linked(&self) -> bool {
        !self.linked_artifacts.is_empty()
    }

    /// Success path.
    pub fn commit(self) -> Result<()> {
        if self.had_prefix && self.stash_path.is_dir() {
            fs::remove_dir_all(&self.stash_path).map_err(|e| InstallError::from(KfError::from(e)))?;
        }
        Ok(())
    }

    /// Failure path: renames the stash back and re-links the
    /// previously-linked keg. `shared_prefix`/`opt_dir` are needed again
    /// to recreate the symlinks `discover_linked_artifacts` found.
    pub fn rollback(self, shared_prefix: &Path, opt_dir: &Path) -> Result<()> {
        if self.had_prefix && !self.original_prefix.is_dir() {
            fs::rename(&self.stash_path, &self.original_prefix)
                .map_err(|e| InstallError::from(KfError::from(e)))?;
        }
        if !self.linked_artifacts.is_empty() {
            let _ = kegforge_aio::link(&self.name, &self.original_prefix, shared_prefix, opt_dir, false);
        }
        Ok(())
    }
}

/// "On any exception, within an interrupt-masked region,
/// remove the (possibly partial) prefix and remove the rack if empty."
/// Armed by default; `disarm` on success so the destructor does nothing.
pub struct PrefixCleanupGuard<'a> {
    prefix: &'a Path,
    rack: &'a Path,
    armed: bool,
}

impl<'a> PrefixCleanupGuard<'a> {
    pub fn new(prefix: &'a Path, rack: &'a Path) -> Self {
        Self {
            prefix,
            rack,
            armed: true,
        }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PrefixCleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let _ = fs::remove_dir_all(self.prefix);
        if let Ok(mut entries) = fs::read_dir(self.rack) {
            if entries.next().is_none() {
                let _ = fs::remove_dir(self.rack);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_prior_tree_and_relinks() {
        let root = tempfile::tempdir().unwrap();
        let prefix = root.path().join("Cellar/delta/1.0");
        fs::create_dir_all(prefix.join("bin")).unwrap();
        fs::write(prefix.join("bin/delta"), b"old").unwrap();
        let shared_prefix = root.path().join("prefix");
        let opt_dir = shared_prefix.join("opt");
        fs::create_dir_all(shared_prefix.join("bin")).unwrap();
        kegforge_aio::link("delta", &prefix, &shared_prefix, &opt_dir, false).unwrap();
        assert!(shared_prefix.join("bin/delta").symlink_metadata().is_ok());

        let stash = DependencyStash::create("delta", &prefix, &shared_prefix, &opt_dir).unwrap();
        assert!(stash.was_linked());
        assert!(!prefix.is_dir());
        assert!(shared_prefix.join("bin/delta").symlink_metadata().is_err());

        // Simulate the new build never materializing a prefix, then fail.
        stash.rollback(&shared_prefix, &opt_dir).unwrap();

        assert!(prefix.is_dir());
        assert_eq!(fs::read_to_string(prefix.join("bin/delta")).unwrap(), "old");
        assert!(shared_prefix.join("bin/delta").symlink_metadata().is_ok());
    }

    #[test]
    fn commit_removes_the_stash() {
        let root = tempfile::tempdir().unwrap();
        let prefix = root.path().join("Cellar/delta/1.0");
        fs::create_dir_all(&prefix).unwrap();
        let shared_prefix = root.path().join("prefix");
        let opt_dir = shared_prefix.join("opt");

        let stash = DependencyStash::create("delta", &prefix, &shared_prefix, &opt_dir).unwrap();
        let stash_path = sibling_tmp(&prefix);
        assert!(stash_path.is_dir());
        // The new build recreates the original path before commit runs.
        fs::create_dir_all(&prefix).unwrap();
        stash.commit().unwrap();
        assert!(!stash_path.exists());
    }

    #[test]
    fn armed_guard_removes_partial_prefix_and_empty_rack() {
        let root = tempfile::tempdir().unwrap();
        let rack = root.path().join("Cellar/alpha");
        let prefix = rack.join("1.0");
        fs::create_dir_all(&prefix).unwrap();
        fs::write(prefix.join("partial"), b"x").unwrap();

        {
            let guard = PrefixCleanupGuard::new(&prefix, &rack);
            drop(guard);
        }
        assert!(!prefix.exists());
        assert!(!rack.exists());
    }

    #[test]
    fn disarmed_guard_leaves_prefix_alone() {
        let root = tempfile::tempdir().unwrap();
        let rack = root.path().join("Cellar/alpha");
        let prefix = rack.join("1.0");
        fs::create_dir_all(&prefix).unwrap();

        let guard = PrefixCleanupGuard::new(&prefix, &rack);
        guard.disarm();
        assert!(prefix.exists());
    }
}
