//! Finisher: runs once after build or pour. Installs the
//! plist, links the keg, relocates install names on macOS, runs the
//! post-install hook (unless building a bottle), prints a summary, and
//! releases the root installer's locks.

use std::fs;
use std::path::Path;

use kegforge_common::config::Config;
use kegforge_common::error::KfError;
use kegforge_common::keg::KegRegistry;
use kegforge_common::model::Formula;
use tracing::warn;

use crate::context::InstallerContext;
use crate::error::{InstallError, Result};

/// Accumulates non-fatal finishing failures: installation is kept, a
/// warning is shown, and the process-wide failure flag (`any_failed`) is
/// set, and never aborts the install.
#[derive(Debug, Default)]
pub struct FinishReport {
    pub any_failed: bool,
    pub show_summary_heading: bool,
    pub warnings: Vec<String>,
    pub link_conflicts: Vec<String>,
}

impl FinishReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.any_failed = true;
        self.show_summary_heading = true;
        self.warnings.push(message);
    }
}

/// atomic plist write, mode 0644, creating the log
/// directory first if the plist content references it.
pub fn install_plist(formula: &Formula, config: &Config, report: &mut FinishReport) {
    let Some(content) = &formula.plist else {
        return;
    };
    if let Err(e) = write_plist(formula, config, content) {
        report.warn(format!(
            "plist install failed for {}: {e}",
            formula.full_name
        ));
    }
}

fn write_plist(formula: &Formula, config: &Config, content: &str) -> Result<()> {
    let logs_dir = formula.logs(config);
    if content.contains("Logs/") {
        fs::create_dir_all(&logs_dir).map_err(|e| InstallError::from(KfError::from(e)))?;
    }
    let plist_dir = config.prefix().join("Library/LaunchAgents");
    fs::create_dir_all(&plist_dir).map_err(|e| InstallError::from(KfError::from(e)))?;
    let plist_path = plist_dir.join(format!("homebrew.mxcl.{}.plist", formula.full_name));

    let mut tmp = tempfile::NamedTempFile::new_in(&plist_dir)
        .map_err(|e| InstallError::from(KfError::from(e)))?;
    use std::io::Write;
    tmp.write_all(content.as_bytes())
        .map_err(|e| InstallError::from(KfError::from(e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|e| InstallError::from(KfError::from(e)))?;
    }
    tmp.persist(&plist_path)
        .map_err(|e| InstallError::from(KfError::Io(std::sync::Arc::new(e.error))))?;
    Ok(())
}

/// construct a `Keg` from `formula.prefix` and link
/// it. `keg_only` formulae get only the opt symlink; an already-linked
/// record is cleared and skipped; on conflict, the caller is expected to
/// have already re-run `link` in dry-run mode (the installer does this,
/// see [`link_with_conflict_recovery`]) so the enumerated paths can be
/// folded into the report.
pub fn link_keg(formula: &Formula, config: &Config, registry: &KegRegistry, report: &mut FinishReport) {
    let keg_path = formula.prefix(config);
    let opt_dir = config.opt_dir();

    if formula.keg_only {
        if let Err(e) = kegforge_aio::optlink(&formula.full_name, &keg_path, &opt_dir) {
            report.warn(format!(
                "opt-link failed for {}: {e}",
                formula.full_name
            ));
        }
        return;
    }

    if registry.is_linked(&formula.full_name)
        && registry.linked_version(&formula.full_name).as_deref()
            == Some(formula.version_str_full().as_str())
    {
        // Already linked to this exact version; nothing to do.
        return;
    }

    match kegforge_aio::link(&formula.full_name, &keg_path, config.prefix(), &opt_dir, false) {
        Ok(_artifacts) => {}
        Err(conflict) => {
            let _ = kegforge_aio::link(&formula.full_name, &keg_path, config.prefix(), &opt_dir, true);
            let paths: Vec<String> = conflict
                .conflicting_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            report.link_conflicts = paths.clone();
            report.warn(format!(
                "link conflict for {}: {} file(s) already present: {}",
                formula.full_name,
                paths.len(),
                paths.join(", ")
            ));
        }
    }
}

/// macOS-only install-name relocation for bottle-
/// sourced trees.
pub fn fix_install_names(formula: &Formula, config: &Config, from_bottle: bool, report: &mut FinishReport) {
    if !from_bottle {
        return;
    }
    let keg_path = formula.prefix(config);
    if let Err(e) = kegforge_aio::fix_install_names(&keg_path) {
        report.warn(format!(
            "install-name relocation failed for {}: {e}",
            formula.full_name
        ));
    }
}

/// post-install hook runs unless we are building a
/// bottle (bottles must not bake in post-install effects). `run_hook` is
/// the installer-supplied callback that actually performs the formula's
/// post-install action, not this crate's concern to define.
pub fn run_post_install(
    formula: &Formula,
    building_bottle: bool,
    run_hook: &dyn Fn(&Formula) -> std::result::Result<(), String>,
    report: &mut FinishReport,
) {
    if building_bottle || !formula.post_install {
        return;
    }
    if let Err(reason) = run_hook(formula) {
        report.warn(format!(
            "post-install hook failed for {}: {reason}",
            formula.full_name
        ));
    }
}

/// release every lock the root installer holds. A
/// nested dependency installer's context doesn't own the locks and this
/// is a no-op for it.
pub fn release_locks(ctx: &mut InstallerContext) {
    ctx.release_locks_if_owner();
}

/// warn if nothing ended up in the formula's prefix.
pub fn warn_if_empty(formula: &Formula, config: &Config, report: &mut FinishReport) {
    let prefix = formula.prefix(config);
    let has_entries = fs::read_dir(&prefix)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !has_entries {
        report.warn(format!("Nothing was installed to {}", prefix.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegforge_common::model::version::Version;

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

    fn dummy(name: &str, version: &str) -> Formula {
        Formula {
            full_name: name.to_string(),
            version: Version::parse(version).unwrap(),
            desc: String::new(),
            homepage: String::new(),
            tap: None,
            deps: Vec::new(),
            requirements: Vec::new(),
            options: kegforge_common::model::Options::new(),
            conflicts: Vec::new(),
            bottle: None,
            plist: None,
            post_install: false,
            keg_only: false,
            head: false,
            devel: false,
            url: String::new(),
            sha256: "0".repeat(64),
            mirrors: Vec::new(),
        }
    }

    #[test]
    fn keg_only_formula_gets_only_opt_link() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = KegRegistry::new(config.clone());
        let mut formula = dummy("foo", "1.0.0");
        formula.keg_only = true;
        let keg_path = formula.prefix(&config);
        fs::create_dir_all(keg_path.join("bin")).unwrap();
        fs::write(keg_path.join("bin/foo"), b"x").unwrap();

        let mut report = FinishReport::default();
        link_keg(&formula, &config, &registry, &mut report);

        assert!(!report.any_failed);
        assert!(config.opt_dir().join("foo").symlink_metadata().is_ok());
        #[cfg(unix)]
        assert!(!config.prefix().join("bin/foo").exists());
    }

    #[test]
    fn link_conflict_sets_failure_flag_and_keeps_keg() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = KegRegistry::new(config.clone());
        let formula = dummy("eta", "1.0.0");
        let keg_path = formula.prefix(&config);
        fs::create_dir_all(keg_path.join("bin")).unwrap();
        fs::write(keg_path.join("bin/eta"), b"new").unwrap();
        fs::create_dir_all(config.prefix().join("bin")).unwrap();
        fs::write(config.prefix().join("bin/eta"), b"existing").unwrap();

        let mut report = FinishReport::default();
        link_keg(&formula, &config, &registry, &mut report);

        assert!(report.any_failed);
        assert!(!report.link_conflicts.is_empty());
        assert!(keg_path.is_dir());
    }

    #[test]
    fn warn_if_empty_flags_missing_installation() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let formula = dummy("bar", "1.0.0");
        fs::create_dir_all(formula.prefix(&config)).unwrap();

        let mut report = FinishReport::default();
        warn_if_empty(&formula, &config, &mut report);
        assert!(report.any_failed);
    }

    #[test]
    fn post_install_skipped_while_building_bottle() {
        let mut formula = dummy("baz", "1.0.0");
        formula.post_install = true;
        let mut report = FinishReport::default();
        run_post_install(&formula, true, &|_| Ok(()), &mut report);
        assert!(!report.any_failed);
    }
}
