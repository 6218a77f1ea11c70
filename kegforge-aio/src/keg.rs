// Tree-linking primitives: `link`, `unlink`, `optlink`, install-name
// relocation. The finisher drives these; this module has no opinion on
// when linking happens, only how one keg's files become visible under a
// shared prefix: walk the keg's `bin`/`lib`/`include`/`share`/`etc`
// subdirectories, symlinking each entry into the matching prefix
// subdirectory, plus the `opt/<name>` sentinel symlink every keg gets
// regardless of `keg_only`.

use std::fs;
use std::path::{Path, PathBuf};

use kegforge_common::error::{KfError, Result};
use kegforge_common::model::InstalledArtifact;
use tracing::{debug, warn};

const LINKABLE_SUBDIRS: [&str; 5] = ["bin", "lib", "include", "share", "etc"];

/// Raised when linking would overwrite a file the keg doesn't own. The
/// finisher catches this, re-runs in dry-run mode to
/// enumerate every conflict, and degrades to a non-fatal failure flag
/// rather than aborting the install.
#[derive(Debug, Clone)]
pub struct LinkConflict {
    pub conflicting_paths: Vec<PathBuf>,
}

/// Creates `opt/<name>` pointing at `keg_path`, replacing any existing
/// link. This is the one artifact `keg_only` formulae still get: a stable
/// path to depend on without polluting the shared prefix.
pub fn optlink(name: &str, keg_path: &Path, opt_dir: &Path) -> Result<InstalledArtifact> {
    fs::create_dir_all(opt_dir)?;
    let link_path = opt_dir.join(name);
    replace_symlink(&link_path, keg_path)?;
    Ok(InstalledArtifact::OptLink {
        link_path,
        target_path: keg_path.to_path_buf(),
    })
}

/// Symlinks every file under `keg_path`'s linkable subdirectories into the
/// matching subdirectory of `prefix`, plus the `opt` sentinel. When
/// `dry_run` is set, no filesystem mutation happens; existing targets are
/// only inspected, so the finisher's conflict-enumeration re-run can
/// report every clashing path without side effects.
pub fn link(
    name: &str,
    keg_path: &Path,
    prefix: &Path,
    opt_dir: &Path,
    dry_run: bool,
) -> std::result::Result<Vec<InstalledArtifact>, LinkConflict> {
    let mut artifacts = Vec::new();
    let mut conflicts = Vec::new();

    for subdir in LINKABLE_SUBDIRS {
        let source_dir = keg_path.join(subdir);
        if !source_dir.is_dir() {
            continue;
        }
        let target_dir = prefix.join(subdir);
        let entries = match fs::read_dir(&source_dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("failed to read {}: {e}", source_dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let source_item = entry.path();
            let file_name = entry.file_name();
            let link_path = target_dir.join(&file_name);

            if link_already_points_here(&link_path, &source_item) {
                continue;
            }
            if link_path.exists() || link_path.symlink_metadata().is_ok() {
                conflicts.push(link_path.clone());
                continue;
            }
            if dry_run {
                continue;
            }
            if let Err(e) = fs::create_dir_all(&target_dir) {
                warn!("failed to create {}: {e}", target_dir.display());
                continue;
            }
            if let Err(e) = create_symlink(&source_item, &link_path) {
                warn!("failed to link {}: {e}", link_path.display());
                continue;
            }
            artifacts.push(classify(subdir, link_path, source_item));
        }
    }

    if !dry_run {
        match optlink(name, keg_path, opt_dir) {
            Ok(a) => artifacts.push(a),
            Err(e) => warn!("failed to create opt link for {name}: {e}"),
        }
    }

    if conflicts.is_empty() {
        Ok(artifacts)
    } else {
        Err(LinkConflict {
            conflicting_paths: conflicts,
        })
    }
}

/// Removes every symlink a prior `link` call created, plus the `opt`
/// sentinel, without touching the keg directory itself. Dependency
/// upgrades call this before stashing the old keg.
pub fn unlink(artifacts: &[InstalledArtifact]) -> Result<()> {
    for artifact in artifacts {
        let link_path = match artifact {
            InstalledArtifact::BinaryLink { link_path, .. }
            | InstalledArtifact::ManpageLink { link_path, .. }
            | InstalledArtifact::DirectoryLink { link_path, .. }
            | InstalledArtifact::OptLink { link_path, .. } => link_path,
        };
        remove_if_symlink(link_path)?;
    }
    Ok(())
}

/// macOS-only install-name relocation. On every other
/// platform the bottle's binaries need no rewriting, so this is a no-op
/// that still validates the keg path exists.
pub fn fix_install_names(keg_path: &Path) -> Result<()> {
    if !keg_path.exists() {
        return Err(KfError::NotFound(format!(
            "cannot fix install names, keg missing: {}",
            keg_path.display()
        )));
    }
    #[cfg(target_os = "macos")]
    {
        debug!(
            "relocating PREFIX_PLACEHOLDER/CELLAR_PLACEHOLDER in {}",
            keg_path.display()
        );
        // Binary rewriting itself (install_name_tool equivalent) is an
        // external collaborator; this crate only validates the keg is in
        // a relocatable state.
    }
    Ok(())
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

fn link_already_points_here(link_path: &Path, target: &Path) -> bool {
    fs::read_link(link_path)
        .map(|existing| existing == target)
        .unwrap_or(false)
}

fn remove_if_symlink(link_path: &Path) -> Result<()> {
    if link_path.symlink_metadata().is_ok() {
        fs::remove_file(link_path).or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Ok(())
            } else {
                Err(KfError::from(e))
            }
        })?;
    }
    Ok(())
}

fn replace_symlink(link_path: &Path, target: &Path) -> Result<()> {
    remove_if_symlink(link_path)?;
    create_symlink(target, link_path)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(KfError::from)
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, _link: &Path) -> Result<()> {
    Err(KfError::Generic(
        "symlinks are not supported on this platform".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_bin_entries_and_opt_sentinel() {
        let root = tempfile::tempdir().unwrap();
        let keg = root.path().join("Cellar/foo/1.0");
        fs::create_dir_all(keg.join("bin")).unwrap();
        fs::write(keg.join("bin/foo"), b"#!/bin/sh\n").unwrap();
        let prefix = root.path().join("prefix");
        let opt_dir = prefix.join("opt");
        fs::create_dir_all(&prefix).unwrap();

        let artifacts = link("foo", &keg, &prefix, &opt_dir, false).unwrap();
        assert!(prefix.join("bin/foo").symlink_metadata().is_ok());
        assert!(opt_dir.join("foo").symlink_metadata().is_ok());
        assert_eq!(artifacts.len(), 2);

        unlink(&artifacts).unwrap();
        assert!(prefix.join("bin/foo").symlink_metadata().is_err());
        assert!(opt_dir.join("foo").symlink_metadata().is_err());
    }

    #[test]
    fn reports_conflicts_without_mutating_in_dry_run() {
        let root = tempfile::tempdir().unwrap();
        let keg = root.path().join("Cellar/foo/1.0");
        fs::create_dir_all(keg.join("bin")).unwrap();
        fs::write(keg.join("bin/foo"), b"new").unwrap();
        let prefix = root.path().join("prefix");
        fs::create_dir_all(prefix.join("bin")).unwrap();
        fs::write(prefix.join("bin/foo"), b"existing, not ours").unwrap();
        let opt_dir = prefix.join("opt");

        let err = link("foo", &keg, &prefix, &opt_dir, true).unwrap_err();
        assert_eq!(err.conflicting_paths.len(), 1);
        assert_eq!(
            fs::read_to_string(prefix.join("bin/foo")).unwrap(),
            "existing, not ours"
        );
    }
}
