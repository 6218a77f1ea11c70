//! `kegforge uninstall <formula>...`: removes each formula's currently
//! installed keg (and its symlinks) from the prefix.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use kegforge_common::error::{KfError, Result};
use kegforge_common::keg::KegRegistry;
use kegforge_common::{Cache, Config};

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Formulae to uninstall.
    #[arg(required = true)]
    pub formulae: Vec<String>,
}

impl UninstallArgs {
    pub async fn run(&self, config: &Config, _cache: Arc<Cache>) -> Result<()> {
        let registry = KegRegistry::new(config.clone());
        let mut failures = Vec::new();

        for name in &self.formulae {
            let Some(keg) = registry
                .get_installed_keg(name)
                .map_err(|e| KfError::Generic(format!("looking up '{name}': {e}")))?
            else {
                failures.push(format!("{name}: not installed"));
                continue;
            };

            match kegforge_core::uninstall::uninstall_formula(config, &registry, name, &keg.version_str) {
                Ok(()) => println!("{} Uninstalled {}", "==>".green().bold(), name.bold()),
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(KfError::Generic(format!(
                "failed to uninstall: {}",
                failures.join(", ")
            )))
        }
    }
}
