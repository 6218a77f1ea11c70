//! `kegforge init`: creates the prefix directory layout so the rest of
//! the CLI has somewhere to write. Runs before the rest of `Config` is
//! assumed to exist on disk, so it only needs `Config::load`'s
//! path-derivation, not a fully populated prefix.

use clap::Args;
use colored::Colorize;
use kegforge_common::error::Result;
use kegforge_common::Config;
use tracing::{debug, info};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-create the layout even if the prefix already looks initialized.
    #[arg(long)]
    pub force: bool,
}

const LAYOUT_DIRS: &[&str] = &[
    "bin",
    "lib",
    "include",
    "share",
    "etc",
    "var",
    "opt",
    "Library/Taps",
    "Library/LaunchAgents",
];

impl InitArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let prefix = config.prefix();
        let marker = prefix.join(".kegforge_root");

        if marker.exists() && !self.force {
            info!(
                "{} already initialized ({})",
                prefix.display(),
                marker.display()
            );
            return Ok(());
        }

        info!("Initializing kegforge prefix at {}", prefix.display());

        for rel in LAYOUT_DIRS {
            let dir = prefix.join(rel);
            debug!("creating {}", dir.display());
            std::fs::create_dir_all(&dir)?;
        }
        std::fs::create_dir_all(config.cellar_path())?;
        std::fs::create_dir_all(config.cache_dir())?;
        std::fs::create_dir_all(config.logs_dir())?;
        std::fs::write(&marker, b"kegforge root directory version 1\n")?;

        println!(
            "{} {}",
            "==>".green().bold(),
            format!("Initialized kegforge prefix at {}", prefix.display()).bold()
        );
        Ok(())
    }
}
