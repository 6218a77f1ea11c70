//! Bottle pour driver. Fetch or adopt a local archive, stage
//! it into the cellar, reconcile `etc`/`var` content into the shared
//! prefix, and persist the tab with `poured_from_bottle = true`.

use std::fs;
use std::path::{Path, PathBuf};

use kegforge_common::error::KfError;
use kegforge_common::model::BottleSpec;
use kegforge_common::tab::Tab;

use crate::error::{InstallError, Result};

/// Where the archive to pour comes from: the formula's own bottle
/// descriptor (fetched and integrity-checked), or a locally supplied
/// path that bypasses both fetch and checksum.
pub enum BottleSource<'a> {
    Remote(&'a BottleSpec),
    LocalPath(PathBuf),
}

/// an external hook may claim the pour entirely
/// (mirroring the installer's own external-hook bypass in the oracle).
/// When it does, the caller is responsible for the actual work; this
/// driver is not invoked.
pub fn external_hook_claims_pour(claims: bool) -> bool {
    claims
}

/// steps 2-3: obtain the archive (fetching it if remote) and
/// stage it into `bottle_prefix`, the staging subtree inside the newly
/// extracted cellar tree.
pub async fn fetch_and_stage(
    name: &str,
    source: BottleSource<'_>,
    mirrors: &[String],
    cache_dir: &Path,
    bottle_prefix: &Path,
) -> Result<()> {
    let archive_path = match source {
        BottleSource::Remote(bottle) => {
            kegforge_net::fetch(name, &bottle.url, &bottle.sha256, mirrors, cache_dir)
                .await
                .map_err(InstallError::from)?
        }
        BottleSource::LocalPath(path) => path,
    };

    fs::create_dir_all(bottle_prefix).map_err(|e| InstallError::from(KfError::from(e)))?;
    kegforge_aio::stage(&archive_path, bottle_prefix, 1).map_err(InstallError::from)?;
    Ok(())
}

/// rewrite `{bottle_prefix}/{etc,var}/**/*` into the
/// shared prefix. Files that would overwrite a user-edited config get a
/// variant name (`<name>.default`) instead of clobbering it, mirroring
/// Homebrew's "don't stomp the user's /etc/foo.conf" policy.
pub fn reconcile_etc_var(bottle_prefix: &Path, shared_prefix: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for subdir in ["etc", "var"] {
        let source_root = bottle_prefix.join(subdir);
        if !source_root.is_dir() {
            continue;
        }
        let target_root = shared_prefix.join(subdir);
        copy_tree_with_overwrite_avoidance(&source_root, &target_root, &mut written)?;
    }
    Ok(written)
}

fn copy_tree_with_overwrite_avoidance(
    source: &Path,
    target: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    fs::create_dir_all(target).map_err(|e| InstallError::from(KfError::from(e)))?;
    for entry in fs::read_dir(source).map_err(|e| InstallError::from(KfError::from(e)))? {
        let entry = entry.map_err(|e| InstallError::from(KfError::from(e)))?;
        let source_path = entry.path();
        let target_path = target.join(entry.file_name());

        if source_path.is_dir() {
            copy_tree_with_overwrite_avoidance(&source_path, &target_path, written)?;
            continue;
        }

        let final_target = if target_path.exists() {
            variant_path(&target_path)
        } else {
            target_path
        };
        fs::copy(&source_path, &final_target).map_err(|e| InstallError::from(KfError::from(e)))?;
        written.push(final_target);
    }
    Ok(())
}

fn variant_path(original: &Path) -> PathBuf {
    let mut candidate = original.with_extension("default");
    let mut n = 1;
    while candidate.exists() {
        candidate = original.with_file_name(format!(
            "{}.default.{n}",
            original.file_name().unwrap_or_default().to_string_lossy()
        ));
        n += 1;
    }
    candidate
}

/// copy everything staged under `bottle_prefix` into the
/// real keg at `keg_prefix`, except `etc`/`var`, which `reconcile_etc_var`
/// has already merged into the shared prefix and must not be duplicated
/// into the keg itself.
pub fn materialize_keg(bottle_prefix: &Path, keg_prefix: &Path) -> Result<()> {
    fs::create_dir_all(keg_prefix).map_err(|e| InstallError::from(KfError::from(e)))?;
    for entry in fs::read_dir(bottle_prefix).map_err(|e| InstallError::from(KfError::from(e)))? {
        let entry = entry.map_err(|e| InstallError::from(KfError::from(e)))?;
        let name = entry.file_name();
        if name == "etc" || name == "var" {
            continue;
        }
        copy_tree_overwriting(&entry.path(), &keg_prefix.join(&name))?;
    }
    Ok(())
}

fn copy_tree_overwriting(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        fs::create_dir_all(target).map_err(|e| InstallError::from(KfError::from(e)))?;
        for entry in fs::read_dir(source).map_err(|e| InstallError::from(KfError::from(e)))? {
            let entry = entry.map_err(|e| InstallError::from(KfError::from(e)))?;
            copy_tree_overwriting(&entry.path(), &target.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallError::from(KfError::from(e)))?;
        }
        fs::copy(source, target).map_err(|e| InstallError::from(KfError::from(e)))?;
    }
    Ok(())
}

/// remove `bottle_prefix` so the cellar tree contains
/// only the formula's keg.
pub fn remove_staging_subtree(bottle_prefix: &Path) -> Result<()> {
    if bottle_prefix.is_dir() {
        fs::remove_dir_all(bottle_prefix).map_err(|e| InstallError::from(KfError::from(e)))?;
    }
    Ok(())
}

/// Loads the keg's tab (or starts a fresh one), stamps
/// `tap`/`poured_from_bottle`, and persists it. Compiler compatibility
/// against recursive deps' compilers is not independently verified here,
/// beyond recording the compiler the tab already carries; there's no
/// compiler probe collaborator in scope.
pub fn finalize_tab(keg_path: &Path, tap: Option<String>, used_options: &kegforge_common::model::Options) -> Result<()> {
    let mut tab = if Tab::exists_in(keg_path) {
        Tab::read_from(keg_path).map_err(InstallError::from)?
    } else {
        Tab::new(used_options.clone(), true, false)
    };
    tab.tap = tap;
    tab.poured_from_bottle = true;
    tab.write_to(keg_path).map_err(InstallError::from)?;
    Ok(())
}
