//! `kegforge list`: enumerates installed kegs from the cellar.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use kegforge_common::error::Result;
use kegforge_common::keg::KegRegistry;
use kegforge_common::{Cache, Config};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show only the versions currently linked into the prefix.
    #[arg(long)]
    pub linked_only: bool,
}

impl ListArgs {
    pub async fn run(&self, config: &Config, _cache: Arc<Cache>) -> Result<()> {
        let registry = KegRegistry::new(config.clone());
        let mut kegs = registry.list_installed_kegs()?;
        kegs.sort_by(|a, b| a.name.cmp(&b.name).then(a.version_str.cmp(&b.version_str)));

        if kegs.is_empty() {
            println!("{}", "0 kegs installed".yellow());
            return Ok(());
        }

        for keg in &kegs {
            let linked = registry.is_linked(&keg.name)
                && registry.linked_version(&keg.name).as_deref() == Some(keg.version_str.as_str());
            if self.linked_only && !linked {
                continue;
            }
            let marker = if linked { "*".green().to_string() } else { " ".to_string() };
            println!("{marker} {} {}", keg.name.bold(), keg.version_str.cyan());
        }
        Ok(())
    }
}
