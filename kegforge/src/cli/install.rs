//! `kegforge install <formula>...`: runs the full prelude/install
//! sequence for each requested formula in turn.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use kegforge_common::error::{KfError, Result};
use kegforge_common::formulary::Formulary;
use kegforge_common::model::{Formula, Options};
use kegforge_common::{Cache, Config};
use kegforge_core::error::InstallError;
use kegforge_core::installer::{Collaborators, Installer, ModeFlags};
use kegforge_core::InstallerContext;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Formulae to install.
    #[arg(required = true)]
    pub formulae: Vec<String>,

    /// Build from source even when a bottle is available.
    #[arg(long)]
    pub build_from_source: bool,

    /// Force producing/consuming a bottle artifact.
    #[arg(long)]
    pub force_bottle: bool,

    /// Install only this formula's dependencies, not the formula itself.
    #[arg(long)]
    pub only_deps: bool,

    /// Skip dependency resolution entirely.
    #[arg(long)]
    pub ignore_dependencies: bool,
}

impl InstallArgs {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let formulary = Formulary::new(cache.config().clone());
        let flags = ModeFlags {
            build_from_source: self.build_from_source,
            force_bottle: self.force_bottle,
            only_deps: self.only_deps,
            ignore_deps: self.ignore_dependencies,
            ..ModeFlags::default()
        };

        let mut ctx = InstallerContext::new();
        for name in &self.formulae {
            install_one(config, &formulary, &mut ctx, name, flags.clone()).await?;
        }
        Ok(())
    }
}

async fn install_one(
    config: &Config,
    formulary: &Formulary,
    ctx: &mut InstallerContext,
    name: &str,
    flags: ModeFlags,
) -> Result<()> {
    let formula = formulary
        .load_formula(name)
        .map_err(|e| KfError::Generic(format!("loading '{name}': {e}")))?;

    println!("{} Installing {}", "==>".blue().bold(), name.bold());

    let collaborators = build_collaborators(config, formulary);
    let mut installer = Installer::new(config, flags, Options::new());

    let plan = installer
        .prelude(ctx, &formula, &collaborators)
        .map_err(|e| KfError::Generic(e.to_string()))?;

    if !installer.flags.ignore_deps {
        installer
            .install_dependencies(ctx, &plan, &collaborators)
            .await
            .map_err(|e| KfError::Generic(e.to_string()))?;
    }

    let outcome = installer
        .install(ctx, &formula, &collaborators)
        .await
        .map_err(|e| KfError::Generic(e.to_string()))?;

    if outcome.finish.any_failed {
        println!(
            "{} {} installed with warnings: {:?}",
            "==>".yellow().bold(),
            name,
            outcome.finish.warnings
        );
    } else {
        println!("{} {} installed", "==>".green().bold(), name.bold());
    }
    Ok(())
}

pub(crate) fn build_collaborators<'a>(config: &'a Config, formulary: &'a Formulary) -> Collaborators<'a> {
    let cellar_compatible_local: &'a str =
        Box::leak(config.cellar_path().display().to_string().into_boxed_str());
    Collaborators {
        load_formula: Box::leak(Box::new(move |name: &str| formulary.load_formula(name).ok())),
        retap: Box::leak(Box::new(|_name: &str| false)),
        mirrors: Box::leak(Box::new(|_name: &str| Vec::new())),
        run_build: Box::leak(Box::new(move |formula: &Formula, prefix: &Path| {
            let formula = formula.clone();
            let rack = formula.rack(config);
            let cache_dir = config.cache_dir().to_path_buf();
            let logs = formula.logs(config);
            let prefix = prefix.to_path_buf();
            let formula_path = config
                .get_tap_path(formula.tap.as_deref().unwrap_or("homebrew/core"))
                .unwrap_or_else(|| config.taps_dir.clone())
                .join(format!("{}.rb", formula.full_name));
            Box::pin(async move {
                std::fs::create_dir_all(&logs).map_err(|e| InstallError::from(KfError::from(e)))?;
                kegforge_core::build::run_build(
                    &formula,
                    &formula_path,
                    &prefix,
                    &rack,
                    &cache_dir,
                    "/usr/bin/env",
                    "",
                    "ruby",
                    &kegforge_core::build::BuildFlags::default(),
                    &kegforge_common::model::BuildOptions::new(Options::new(), formula.options.clone()),
                    &HashMap::new(),
                )
                .await
            })
        })),
        run_pour: Box::leak(Box::new(move |formula: &Formula, prefix: &Path| {
            let formula = formula.clone();
            let prefix = prefix.to_path_buf();
            let bottle_prefix = formula.bottle_prefix(config);
            let cache_dir = config.cache_dir().to_path_buf();
            let shared_prefix = config.prefix().to_path_buf();
            Box::pin(async move {
                let Some(bottle) = formula.bottle.as_ref() else {
                    return Err(InstallError::PourFailed {
                        formula: formula.full_name.clone(),
                        reason: "no bottle available".to_string(),
                    });
                };
                kegforge_core::pour::fetch_and_stage(
                    &formula.full_name,
                    kegforge_core::pour::BottleSource::Remote(bottle),
                    &formula.mirrors,
                    &cache_dir,
                    &bottle_prefix,
                )
                .await?;
                kegforge_core::pour::reconcile_etc_var(&bottle_prefix, &shared_prefix)?;
                kegforge_core::pour::materialize_keg(&bottle_prefix, &prefix)?;
                kegforge_core::pour::remove_staging_subtree(&bottle_prefix)?;
                kegforge_core::pour::finalize_tab(&prefix, formula.tap.clone(), &formula.options)?;
                Ok(())
            })
        })),
        run_post_install_hook: Box::leak(Box::new(|_formula: &Formula| Ok(()))),
        external_pour_hook_claims: Box::leak(Box::new(|_formula: &Formula| false)),
        cellar_compatible_local,
    }
}
