//! Install orchestration: the `Installer` runs
//! `prelude → install → (pour | build → clean) → finish` for one
//! formula, recursing into a suppressed-expansion child installer for
//! each dependency.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use kegforge_common::config::Config;
use kegforge_common::keg::KegRegistry;
use kegforge_common::model::{BuildOptions, Formula, Options};

use crate::context::InstallerContext;
use crate::error::{InstallError, Result};
use crate::expand::{self, ExpansionContext};
use crate::finish::{self, FinishReport};
use crate::oracle::{self, OracleFlags};
use crate::preflight;
use crate::rollback::DependencyStash;

type BoxResult<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Flags that control how a formula is installed. Grouped separately from
/// the per-instance mutable fields so a child dependency installer can
/// copy just this slice, seeded from the root's
/// `build_from_source`/`verbose`/`debug` flags.
#[derive(Debug, Clone, Default)]
pub struct ModeFlags {
    pub build_from_source: bool,
    pub build_bottle: bool,
    pub bottle_arch: Option<String>,
    pub force_bottle: bool,
    pub ignore_deps: bool,
    pub only_deps: bool,
    pub interactive: bool,
    pub git: bool,
    pub verbose: bool,
    pub debug: bool,
    pub quieter: bool,
    pub force: bool,
    /// Developer mode changes only one thing: a pour failure re-raises
    /// instead of falling back to source.
    pub developer_mode: bool,
}

/// The collaborators this crate treats as external: formula
/// loading, retapping, mirror lookup, and the two async steps (build,
/// pour). Injected rather than hardwired so install orchestration is
/// testable without a real formula index, network, or child process.
pub struct Collaborators<'a> {
    pub load_formula: &'a (dyn Fn(&str) -> Option<Formula> + Sync),
    pub retap: &'a (dyn Fn(&str) -> bool + Sync),
    pub mirrors: &'a (dyn Fn(&str) -> Vec<String> + Sync),
    pub run_build: &'a (dyn Fn(&Formula, &Path) -> BoxResult<'a> + Sync),
    pub run_pour: &'a (dyn Fn(&Formula, &Path) -> BoxResult<'a> + Sync),
    pub run_post_install_hook: &'a (dyn Fn(&Formula) -> std::result::Result<(), String> + Sync),
    pub external_pour_hook_claims: &'a (dyn Fn(&Formula) -> bool + Sync),
    pub cellar_compatible_local: &'a str,
}

/// Outcome of one `install` call, surfaced to the caller for summary
/// printing and exit-status purposes; the installer itself never calls
/// `exit`.
#[derive(Debug, Default)]
pub struct InstallOutcome {
    pub poured_bottle: bool,
    pub pour_failed: bool,
    pub finish: FinishReport,
}

/// One install run. Not `Clone`: a fresh instance is constructed for
/// each dependency recursion, sharing the process-wide [`InstallerContext`].
pub struct Installer<'a> {
    pub config: &'a Config,
    pub registry: KegRegistry,
    pub flags: ModeFlags,
    pub requested_options: Options,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a Config, flags: ModeFlags, requested_options: Options) -> Self {
        Self {
            config,
            registry: KegRegistry::new(config.clone()),
            flags,
            requested_options,
        }
    }

    /// Loads the formula plus every transitive dependency,
    /// acquires the root's locks, and runs the conflict/unlinked-deps
    /// gates. Returns the dependency install plan (already pruned and
    /// ordered leaves-first) ready for `install_dependencies`.
    pub fn prelude(
        &self,
        ctx: &mut InstallerContext,
        formula: &Formula,
        collaborators: &Collaborators<'_>,
    ) -> Result<Vec<(kegforge_common::Dependency, Options)>> {
        preflight::check_not_linked_different_version(&self.registry, formula)?;
        preflight::check_conflicts(
            &self.registry,
            &formula.full_name,
            &formula.conflicts,
            self.flags.force,
        )?;

        let build_for = |_: &str| BuildOptions::new(self.requested_options.clone(), formula.options.clone());
        let exp_ctx = ExpansionContext {
            load: collaborators.load_formula,
            will_be_poured: &|name: &str| {
                self.will_be_poured_heuristic(name, collaborators)
            },
            build_options_for: &build_for,
            is_satisfied: &|name, _opts| self.registry.get_installed_keg(name).ok().flatten().is_some(),
            root_universal: formula.options.contains("universal"),
            building_bottle: self.flags.build_bottle,
        };

        let (unsatisfied, materialized) = expand::expand_requirements(formula, &exp_ctx);
        let fatal: Vec<String> = unsatisfied
            .values()
            .flatten()
            .filter(|r| r.fatal())
            .map(|r| r.to_string())
            .collect();
        if !fatal.is_empty() {
            return Err(InstallError::UnsatisfiedRequirements {
                formula: formula.full_name.clone(),
                requirements: fatal,
            });
        }

        let plan = expand::expand_dependencies(formula, &materialized, &exp_ctx)?;

        let dep_names: Vec<String> = plan.iter().map(|(d, _)| d.name.clone()).collect();
        let edges: Vec<(String, String)> = plan
            .iter()
            .map(|(d, _)| (formula.full_name.clone(), d.name.clone()))
            .collect();
        preflight::load_transitive(
            collaborators.load_formula,
            collaborators.retap,
            &formula.full_name,
            &edges,
        )?;

        if !self.flags.ignore_deps {
            let dep_keg_only: Vec<(String, bool)> = plan
                .iter()
                .filter_map(|(d, _)| {
                    (collaborators.load_formula)(&d.name).map(|f| (d.name.clone(), f.keg_only))
                })
                .collect();
            preflight::check_unlinked_gate(&self.registry, &dep_keg_only)?;
        }

        preflight::acquire_prelude_locks(self.config, ctx, &formula.full_name, &dep_names)?;
        preflight::check_not_attempted(ctx, &formula.full_name)?;

        Ok(plan)
    }

    fn will_be_poured_heuristic(&self, name: &str, collaborators: &Collaborators<'_>) -> bool {
        let Some(formula) = (collaborators.load_formula)(name) else {
            return false;
        };
        let oracle_flags = OracleFlags {
            pour_failed: false,
            build_from_source: self.flags.build_from_source,
            build_bottle: self.flags.build_bottle,
            force_bottle: self.flags.force_bottle,
            interactive: self.flags.interactive,
        };
        let (decision, _) = oracle::pour_bottle(
            &oracle_flags,
            &Options::new(),
            formula.bottle.as_ref(),
            collaborators.cellar_compatible_local,
            false,
            false,
            (collaborators.external_pour_hook_claims)(&formula),
            false,
        );
        decision
    }

    /// the strict install sequence for one formula, assuming
    /// `prelude` already ran and dependencies (if any) are installed.
    pub async fn install(
        &mut self,
        ctx: &mut InstallerContext,
        formula: &Formula,
        collaborators: &Collaborators<'_>,
    ) -> Result<InstallOutcome> {
        let mut outcome = InstallOutcome::default();

        if self.flags.only_deps {
            ctx.enter(&formula.full_name).ok();
            return Ok(outcome);
        }

        ctx.enter(&formula.full_name).ok();

        let oracle_flags = OracleFlags {
            pour_failed: false,
            build_from_source: self.flags.build_from_source,
            build_bottle: self.flags.build_bottle,
            force_bottle: self.flags.force_bottle,
            interactive: self.flags.interactive,
        };
        let (should_pour, warning) = oracle::pour_bottle(
            &oracle_flags,
            &self.requested_options,
            formula.bottle.as_ref(),
            collaborators.cellar_compatible_local,
            false,
            false,
            (collaborators.external_pour_hook_claims)(formula),
            true,
        );
        if let Some(warning) = warning {
            tracing::warn!("{warning}");
        }

        let keg_path = formula.prefix(self.config);

        if should_pour {
            match (collaborators.run_pour)(formula, &keg_path).await {
                Ok(()) => outcome.poured_bottle = true,
                Err(e) if !self.flags.developer_mode => {
                    tracing::warn!("bottle pour failed for {}: {e}", formula.full_name);
                    outcome.pour_failed = true;
                }
                Err(e) => return Err(e),
            }
        }

        if outcome.pour_failed && !self.flags.ignore_deps {
            self.recompute_and_install_pour_fallback_deps(ctx, formula, collaborators)
                .await?;
        }

        if !outcome.poured_bottle {
            (collaborators.run_build)(formula, &keg_path).await?;
        }

        finish::install_plist(formula, self.config, &mut outcome.finish);
        finish::link_keg(formula, self.config, &self.registry, &mut outcome.finish);
        finish::fix_install_names(formula, self.config, outcome.poured_bottle, &mut outcome.finish);
        finish::run_post_install(
            formula,
            self.flags.build_bottle,
            collaborators.run_post_install_hook,
            &mut outcome.finish,
        );
        finish::warn_if_empty(formula, self.config, &mut outcome.finish);
        finish::release_locks(ctx);

        Ok(outcome)
    }

    /// after a pour failure, re-expands dependencies with
    /// `will_be_poured` forced false for `formula` itself, since
    /// `prelude` pruned its `:build`-tagged edges on the assumption it
    /// would pour rather than compile. `is_satisfied` and
    /// `install_dependencies`'s `ctx.has_attempted` check keep this
    /// idempotent: anything the first pass already installed is skipped,
    /// not reinstalled.
    async fn recompute_and_install_pour_fallback_deps(
        &self,
        ctx: &mut InstallerContext,
        formula: &Formula,
        collaborators: &Collaborators<'_>,
    ) -> Result<()> {
        let build_for =
            |_: &str| BuildOptions::new(self.requested_options.clone(), formula.options.clone());
        let exp_ctx = ExpansionContext {
            load: collaborators.load_formula,
            will_be_poured: &|name: &str| {
                if name == formula.full_name {
                    false
                } else {
                    self.will_be_poured_heuristic(name, collaborators)
                }
            },
            build_options_for: &build_for,
            is_satisfied: &|name, _opts| self.registry.get_installed_keg(name).ok().flatten().is_some(),
            root_universal: formula.options.contains("universal"),
            building_bottle: self.flags.build_bottle,
        };

        let (_, materialized) = expand::expand_requirements(formula, &exp_ctx);
        let plan = expand::expand_dependencies(formula, &materialized, &exp_ctx)?;
        self.install_dependencies(ctx, &plan, collaborators).await
    }

    /// installs one dependency edge, stashing and restoring
    /// the dep's prior keg transactionally around the child install. The
    /// transitive closure is already flattened leaves-first by
    /// `expand_dependencies`, so this does not recurse into further
    /// sub-dependencies itself; `install_dependencies` below iterates
    /// the whole plan.
    pub async fn install_dependency(
        &self,
        ctx: &mut InstallerContext,
        dep_name: &str,
        inherited_options: Options,
        collaborators: &Collaborators<'_>,
    ) -> Result<()> {
        let dep_formula = (collaborators.load_formula)(dep_name)
            .ok_or_else(|| InstallError::FormulaUnavailable(dep_name.to_string()))?;

        let dep_prefix = dep_formula.prefix(self.config);
        let opt_dir = self.config.opt_dir();
        let stash = DependencyStash::create(dep_name, &dep_prefix, self.config.prefix(), &opt_dir)?;

        let mut child = Installer::new(
            self.config,
            ModeFlags {
                ignore_deps: true,
                build_from_source: self.flags.build_from_source,
                verbose: self.flags.verbose,
                debug: self.flags.debug,
                ..ModeFlags::default()
            },
            inherited_options,
        );

        let result = child.install(ctx, &dep_formula, collaborators).await;

        match result {
            Ok(_) => {
                stash.commit()?;
                Ok(())
            }
            Err(e) => {
                stash.rollback(self.config.prefix(), &opt_dir)?;
                Err(e)
            }
        }
    }

    /// installs every plan entry leaves-first.
    pub async fn install_dependencies(
        &self,
        ctx: &mut InstallerContext,
        plan: &[(kegforge_common::Dependency, Options)],
        collaborators: &Collaborators<'_>,
    ) -> Result<()> {
        for (dep, inherited) in plan {
            if ctx.has_attempted(&dep.name) {
                continue;
            }
            self.install_dependency(ctx, &dep.name, inherited.clone(), collaborators)
                .await?;
        }
        Ok(())
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
            options: Options::new(),
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

    fn stub_collaborators<'a>(
        formulas: &'a std::collections::HashMap<String, Formula>,
    ) -> Collaborators<'a> {
        Collaborators {
            load_formula: &move |name: &str| formulas.get(name).cloned(),
            retap: &|_| false,
            mirrors: &|_| Vec::new(),
            run_build: &|_formula, prefix| {
                let prefix = prefix.to_path_buf();
                Box::pin(async move {
                    std::fs::create_dir_all(prefix.join("bin"))
                        .map_err(|e| InstallError::from(kegforge_common::error::KfError::from(e)))?;
                    std::fs::write(prefix.join("bin/tool"), b"built")
                        .map_err(|e| InstallError::from(kegforge_common::error::KfError::from(e)))?;
                    Ok(())
                })
            },
            run_pour: &|_formula, prefix| {
                let prefix = prefix.to_path_buf();
                Box::pin(async move {
                    std::fs::create_dir_all(prefix.join("bin"))
                        .map_err(|e| InstallError::from(kegforge_common::error::KfError::from(e)))?;
                    std::fs::write(prefix.join("bin/tool"), b"poured")
                        .map_err(|e| InstallError::from(kegforge_common::error::KfError::from(e)))?;
                    Ok(())
                })
            },
            run_post_install_hook: &|_| Ok(()),
            external_pour_hook_claims: &|_| false,
            cellar_compatible_local: "/prefix/Cellar",
        }
    }

    #[tokio::test]
    async fn s1_fresh_source_install_links_into_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.prefix()).unwrap();

        let mut formulas = std::collections::HashMap::new();
        formulas.insert("alpha".to_string(), dummy("alpha", "1.0.0"));
        let collaborators = stub_collaborators(&formulas);

        let mut ctx = InstallerContext::new();
        let mut installer = Installer::new(&config, ModeFlags::default(), Options::new());
        let formula = formulas.get("alpha").unwrap();
        let plan = installer.prelude(&mut ctx, formula, &collaborators).unwrap();
        assert!(plan.is_empty());

        let outcome = installer.install(&mut ctx, formula, &collaborators).await.unwrap();
        assert!(!outcome.poured_bottle);
        assert!(!outcome.finish.any_failed);
        assert!(config.prefix().join("bin/tool").symlink_metadata().is_ok());
        assert!(ctx.has_attempted("alpha"));
    }

    #[tokio::test]
    async fn s6_only_deps_attempts_only_the_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.prefix()).unwrap();

        let mut formulas = std::collections::HashMap::new();
        let mut theta = dummy("theta", "1.0.0");
        theta.deps = vec![kegforge_common::Dependency::new_runtime("iota")];
        formulas.insert("theta".to_string(), theta);
        formulas.insert("iota".to_string(), dummy("iota", "1.0.0"));
        let collaborators = stub_collaborators(&formulas);

        let mut ctx = InstallerContext::new();
        let mut flags = ModeFlags::default();
        flags.only_deps = true;
        let mut installer = Installer::new(&config, flags, Options::new());
        let formula = formulas.get("theta").unwrap();
        let plan = installer.prelude(&mut ctx, formula, &collaborators).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0.name, "iota");

        installer
            .install_dependencies(&mut ctx, &plan, &collaborators)
            .await
            .unwrap();
        assert!(ctx.has_attempted("iota"));
        assert!(config.cellar_path().join("iota/1.0.0/bin/tool").exists());

        let outcome = installer.install(&mut ctx, formula, &collaborators).await.unwrap();
        assert!(ctx.has_attempted("theta"));
        assert!(!outcome.finish.any_failed);
        // only_deps installs the dependency but never builds/links theta itself.
        assert!(!config.cellar_path().join("theta/1.0.0").exists());
    }

    #[tokio::test]
    async fn s4_conflict_aborts_before_any_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.prefix().join("bin")).unwrap();
        std::fs::create_dir_all(config.opt_dir()).unwrap();
        let zeta_keg = config.cellar_path().join("zeta/1.0.0");
        std::fs::create_dir_all(&zeta_keg).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&zeta_keg, config.opt_dir().join("zeta")).unwrap();

        let mut formulas = std::collections::HashMap::new();
        let mut epsilon = dummy("epsilon", "1.0.0");
        epsilon.conflicts = vec!["zeta".to_string()];
        formulas.insert("epsilon".to_string(), epsilon);
        let collaborators = stub_collaborators(&formulas);

        let mut ctx = InstallerContext::new();
        let installer = Installer::new(&config, ModeFlags::default(), Options::new());
        let formula = formulas.get("epsilon").unwrap();

        #[cfg(unix)]
        {
            let result = installer.prelude(&mut ctx, formula, &collaborators);
            assert!(result.is_err());
            assert!(!config.cellar_path().join("epsilon").exists());
        }
    }

    #[tokio::test]
    async fn reentry_into_attempted_formula_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.prefix()).unwrap();
        let mut formulas = std::collections::HashMap::new();
        formulas.insert("alpha".to_string(), dummy("alpha", "1.0.0"));
        let collaborators = stub_collaborators(&formulas);

        let mut ctx = InstallerContext::new();
        let installer = Installer::new(&config, ModeFlags::default(), Options::new());
        let formula = formulas.get("alpha").unwrap();
        installer.prelude(&mut ctx, formula, &collaborators).unwrap();
        assert!(ctx.has_attempted("alpha"));

        let err = installer.prelude(&mut ctx, formula, &collaborators);
        assert!(matches!(err, Err(InstallError::AlreadyAttempted(_))));
    }

    #[tokio::test]
    async fn pour_failure_recomputes_and_installs_build_deps() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.prefix()).unwrap();

        let mut formulas = std::collections::HashMap::new();
        let mut mu = dummy("mu", "1.0.0");
        mu.bottle = Some(kegforge_common::model::BottleSpec {
            cellar: "/prefix/Cellar".to_string(),
            url: "https://example.invalid/mu.tar.gz".into(),
            sha256: "0".repeat(64),
            rebuild: 0,
        });
        mu.deps = vec![kegforge_common::Dependency::new_with_tags(
            "buildtool",
            kegforge_common::DependencyTag::BUILD,
        )];
        formulas.insert("mu".to_string(), mu);
        formulas.insert("buildtool".to_string(), dummy("buildtool", "1.0.0"));

        let mut collaborators = stub_collaborators(&formulas);
        collaborators.run_pour = &|formula: &Formula, _prefix: &Path| {
            let name = formula.full_name.clone();
            Box::pin(async move {
                Err(InstallError::PourFailed {
                    formula: name,
                    reason: "network down".to_string(),
                })
            })
        };

        let mut ctx = InstallerContext::new();
        let mut installer = Installer::new(&config, ModeFlags::default(), Options::new());
        let formula = formulas.get("mu").unwrap();

        // Build-tagged edge is pruned here: `mu` is expected to pour, so
        // its build-only deps are assumed unnecessary.
        let plan = installer.prelude(&mut ctx, formula, &collaborators).unwrap();
        assert!(plan.is_empty());

        let outcome = installer.install(&mut ctx, formula, &collaborators).await.unwrap();
        assert!(outcome.pour_failed);
        assert!(!outcome.poured_bottle);
        assert!(ctx.has_attempted("buildtool"));
        assert!(config.cellar_path().join("buildtool/1.0.0/bin/tool").exists());
    }
}
