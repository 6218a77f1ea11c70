//! Formula uninstall. The installer otherwise only brings a formula
//! *into* an installed state, but the inverse of the dependency
//! installer's stash/restore dance already gives us everything uninstall
//! needs: discover
//! which symlinks point at a keg, remove them, then remove the keg
//! directory and its rack if now empty.

use std::fs;
use std::path::Path;

use kegforge_common::config::Config;
use kegforge_common::keg::KegRegistry;

use crate::error::{InstallError, Result};
use crate::rollback::discover_linked_artifacts;

/// Unlinks `name`'s active keg (if linked) and removes its on-disk keg
/// directory. `keg_version` selects which version under the rack to
/// remove; callers needing "the currently installed version" should
/// resolve it via [`KegRegistry::get_installed_keg`] first.
pub fn uninstall_formula(
    config: &Config,
    registry: &KegRegistry,
    name: &str,
    keg_version: &str,
) -> Result<()> {
    let keg_path = config.formula_keg_path(name, keg_version);
    if !keg_path.exists() {
        return Err(InstallError::FormulaUnavailable(format!(
            "{name} {keg_version} is not installed"
        )));
    }

    let linked = discover_linked_artifacts(name, &keg_path, config.prefix(), &config.opt_dir());
    if !linked.is_empty() {
        kegforge_aio::unlink(&linked)?;
    }

    kegforge_aio::remove_path(&keg_path, false)?;

    let rack = config.formula_rack_dir(name);
    if rack.is_dir() {
        let is_empty = fs::read_dir(&rack)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            kegforge_aio::remove_path(&rack, false)?;
        }
    }

    let _ = registry;
    Ok(())
}
