//! `kegforge status <formula>`: reports whether a formula is installed
//! and/or linked, without touching the network.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use kegforge_common::error::Result;
use kegforge_common::keg::KegRegistry;
use kegforge_common::{Cache, Config};

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub formula: String,
}

impl StatusArgs {
    pub async fn run(&self, config: &Config, _cache: Arc<Cache>) -> Result<()> {
        let registry = KegRegistry::new(config.clone());

        match registry.get_installed_keg(&self.formula)? {
            None => {
                println!("{}: {}", self.formula.bold(), "not installed".red());
            }
            Some(keg) => {
                let linked_version = registry.linked_version(&self.formula);
                let linked = linked_version.as_deref() == Some(keg.version_str.as_str());
                println!(
                    "{}: {} installed at {}",
                    self.formula.bold(),
                    keg.version_str.cyan(),
                    keg.path.display()
                );
                if linked {
                    println!("  {}", "linked".green());
                } else if let Some(other) = linked_version {
                    println!("  {} {other}", "linked to a different version:".yellow());
                } else {
                    println!("  {}", "not linked".yellow());
                }
            }
        }
        Ok(())
    }
}
