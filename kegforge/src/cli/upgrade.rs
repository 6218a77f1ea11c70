//! `kegforge upgrade <formula>...`: relinks each named formula (or every
//! installed formula, with `--all`) to its latest known version.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use kegforge_common::error::{KfError, Result};
use kegforge_common::formulary::Formulary;
use kegforge_common::keg::KegRegistry;
use kegforge_common::model::Options;
use kegforge_common::{Cache, Config};
use kegforge_core::installer::ModeFlags;
use kegforge_core::InstallerContext;

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Formulae to upgrade. Ignored if `--all` is given.
    #[arg(conflicts_with = "all")]
    pub formulae: Vec<String>,

    /// Upgrade every installed formula.
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub build_from_source: bool,
}

impl UpgradeArgs {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let registry = KegRegistry::new(config.clone());
        let targets: Vec<String> = if self.all {
            registry
                .list_installed_kegs()?
                .into_iter()
                .map(|k| k.name)
                .collect()
        } else {
            self.formulae.clone()
        };

        if targets.is_empty() {
            println!("{}", "nothing to upgrade".yellow());
            return Ok(());
        }

        let formulary = Formulary::new(cache.config().clone());
        let flags = ModeFlags {
            build_from_source: self.build_from_source,
            ..ModeFlags::default()
        };
        let mut ctx = InstallerContext::new();

        for name in &targets {
            let formula = formulary
                .load_formula(name)
                .map_err(|e| KfError::Generic(format!("loading '{name}': {e}")))?;

            println!("{} Upgrading {}", "==>".blue().bold(), name.bold());

            let collaborators = crate::cli::install::build_collaborators(config, &formulary);
            kegforge_core::upgrade::upgrade(
                config,
                &mut ctx,
                &formula,
                flags.clone(),
                Options::new(),
                &collaborators,
            )
            .await
            .map_err(|e| KfError::Generic(format!("upgrading '{name}': {e}")))?;

            println!("{} {} upgraded", "==>".green().bold(), name.bold());
        }
        Ok(())
    }
}
