//! Pre-flight gate: loads every transitive dependency's
//! formula (with a single auto-tap retry), acquires the root installer's
//! locks, rejects reentry into the process's `attempted` set, and checks
//! the unlinked-dependency and conflict gates before any mutation begins.

use kegforge_common::config::Config;
use kegforge_common::keg::KegRegistry;
use kegforge_common::model::Formula;

use crate::context::InstallerContext;
use crate::error::{InstallError, Result};
use crate::lock;

/// Loads one formula by name, retrying exactly once via `retap` if the
/// first load fails. `retap` returns whether it
/// believes it has made the formula available; a second load failure
/// after a successful retap still surfaces as unavailable, annotated
/// with the dependent that needed it.
pub fn load_with_retap(
    load: &dyn Fn(&str) -> Option<Formula>,
    retap: &dyn Fn(&str) -> bool,
    name: &str,
    dependent: &str,
) -> Result<Formula> {
    if let Some(formula) = load(name) {
        return Ok(formula);
    }
    if retap(name) {
        if let Some(formula) = load(name) {
            return Ok(formula);
        }
    }
    Err(InstallError::TapFormulaUnavailable {
        formula: name.to_string(),
        dependent: dependent.to_string(),
    })
}

/// Loads the root formula plus every transitive dependency named in
/// `edges` (`(dependent, dep_name)` pairs, as produced by dependency
/// expansion), applying the same retap policy to each.
pub fn load_transitive(
    load: &dyn Fn(&str) -> Option<Formula>,
    retap: &dyn Fn(&str) -> bool,
    root_name: &str,
    edges: &[(String, String)],
) -> Result<Vec<Formula>> {
    let mut loaded = vec![load_with_retap(load, retap, root_name, root_name)?];
    for (dependent, dep_name) in edges {
        loaded.push(load_with_retap(load, retap, dep_name, dependent)?);
    }
    Ok(loaded)
}

/// The root installer acquires locks for the formula and its transitive
/// closure, in a stable order, the first time through. A nested
/// dependency installer finds locks already held and does nothing.
pub fn acquire_prelude_locks(
    config: &Config,
    ctx: &mut InstallerContext,
    formula_name: &str,
    dep_names: &[String],
) -> Result<()> {
    if ctx.holds_locks() {
        return Ok(());
    }
    let mut names = vec![formula_name.to_string()];
    names.extend(dep_names.iter().cloned());
    let locks = lock::acquire_all(config, &names)?;
    ctx.adopt_locks(locks);
    Ok(())
}

/// fails fast on reentry into the process-wide
/// `attempted` set.
pub fn check_not_attempted(ctx: &mut InstallerContext, formula_name: &str) -> Result<()> {
    ctx.enter(formula_name)
}

/// refuses to proceed if a different version is
/// already linked.
pub fn check_not_linked_different_version(registry: &KegRegistry, formula: &Formula) -> Result<()> {
    if let Some(linked_version) = registry.linked_version(&formula.full_name) {
        let wanted = formula.version_str_full();
        if linked_version != wanted {
            return Err(InstallError::AlreadyLinkedDifferentVersion {
                formula: formula.full_name.clone(),
                other_version: linked_version,
                wanted_version: wanted,
            });
        }
    }
    Ok(())
}

/// every installed, non-keg-only dependency must
/// currently be linked. `deps` is `(name, keg_only)` for each dependency
/// edge under consideration.
pub fn unlinked_dependencies(
    registry: &KegRegistry,
    deps: &[(String, bool)],
) -> Result<Vec<String>> {
    let mut unlinked = Vec::new();
    for (name, keg_only) in deps {
        if *keg_only {
            continue;
        }
        let installed = registry
            .get_installed_keg(name)
            .map_err(InstallError::from)?
            .is_some();
        if installed && !registry.is_linked(name) {
            unlinked.push(name.clone());
        }
    }
    Ok(unlinked)
}

pub fn check_unlinked_gate(registry: &KegRegistry, deps: &[(String, bool)]) -> Result<()> {
    let unlinked = unlinked_dependencies(registry, deps)?;
    if unlinked.is_empty() {
        Ok(())
    } else {
        Err(InstallError::UnlinkedDependencies(unlinked))
    }
}

/// "Additionally, `check_conflicts`...": any conflicting
/// formula that is currently linked aborts the install, unless `force`.
pub fn check_conflicts(
    registry: &KegRegistry,
    formula_name: &str,
    conflicts: &[String],
    force: bool,
) -> Result<()> {
    if force {
        return Ok(());
    }
    for name in conflicts {
        if registry.is_linked(name) {
            return Err(InstallError::Conflict {
                formula: formula_name.to_string(),
                conflicting: name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegforge_common::model::version::Version;
    use std::cell::Cell;

    fn test_config(dir: &std::path::Path) -> Config {
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
    fn retap_is_consulted_only_on_first_failure() {
        let calls = Cell::new(0);
        let load = |name: &str| -> Option<Formula> {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                None
            } else {
                Some(dummy(name, "1.0"))
            }
        };
        let retap_calls = Cell::new(0);
        let retap = |_: &str| {
            retap_calls.set(retap_calls.get() + 1);
            true
        };
        let result = load_with_retap(&load, &retap, "foo", "root");
        assert!(result.is_ok());
        assert_eq!(retap_calls.get(), 1);
    }

    #[test]
    fn permanently_unavailable_formula_names_dependent() {
        let load = |_: &str| -> Option<Formula> { None };
        let retap = |_: &str| false;
        let err = load_with_retap(&load, &retap, "foo", "bar").unwrap_err();
        match err {
            InstallError::TapFormulaUnavailable { formula, dependent } => {
                assert_eq!(formula, "foo");
                assert_eq!(dependent, "bar");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn linked_different_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = KegRegistry::new(config.clone());
        std::fs::create_dir_all(config.opt_dir()).unwrap();
        let keg_dir = config.cellar_path().join("foo/1.0.0");
        std::fs::create_dir_all(&keg_dir).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&keg_dir, config.opt_dir().join("foo")).unwrap();

        let formula = dummy("foo", "2.0.0");
        #[cfg(unix)]
        assert!(check_not_linked_different_version(&registry, &formula).is_err());
    }

    #[test]
    fn conflicts_bypassed_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = KegRegistry::new(config.clone());
        std::fs::create_dir_all(config.opt_dir()).unwrap();
        let keg_dir = config.cellar_path().join("bar/1.0.0");
        std::fs::create_dir_all(&keg_dir).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&keg_dir, config.opt_dir().join("bar")).unwrap();

        #[cfg(unix)]
        {
            assert!(check_conflicts(&registry, "foo", &["bar".to_string()], false).is_err());
            assert!(check_conflicts(&registry, "foo", &["bar".to_string()], true).is_ok());
        }
    }

    #[test]
    fn unlinked_installed_non_keg_only_dep_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = KegRegistry::new(config.clone());
        let keg_dir = config.cellar_path().join("baz/1.0.0");
        std::fs::create_dir_all(&keg_dir).unwrap();

        let unlinked =
            unlinked_dependencies(&registry, &[("baz".to_string(), false)]).unwrap();
        assert_eq!(unlinked, vec!["baz".to_string()]);
    }

    #[test]
    fn keg_only_dep_is_never_reported_unlinked() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = KegRegistry::new(config.clone());
        let keg_dir = config.cellar_path().join("baz/1.0.0");
        std::fs::create_dir_all(&keg_dir).unwrap();

        let unlinked =
            unlinked_dependencies(&registry, &[("baz".to_string(), true)]).unwrap();
        assert!(unlinked.is_empty());
    }

    #[test]
    fn nested_installer_does_not_reacquire_locks() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut ctx = InstallerContext::new();
        acquire_prelude_locks(&config, &mut ctx, "foo", &["bar".to_string()]).unwrap();
        assert!(ctx.holds_locks());
        // A second call (as a nested dependency installer would make)
        // must not try to reacquire "foo"'s already-held lock.
        acquire_prelude_locks(&config, &mut ctx, "foo", &["bar".to_string()]).unwrap();
    }
}
