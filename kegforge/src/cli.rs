//! Command-line argument structure and subcommand dispatch.

use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use kegforge_common::error::Result;
use kegforge_common::{Cache, Config};

pub mod init;
pub mod install;
pub mod list;
pub mod status;
pub mod uninstall;
pub mod upgrade;

pub use init::InitArgs;
use install::InstallArgs;
use list::ListArgs;
use status::StatusArgs;
use uninstall::UninstallArgs;
use upgrade::UpgradeArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "kegforge", bin_name = "kegforge")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the kegforge prefix directory layout.
    Init(InitArgs),
    /// Install a formula and its dependencies.
    Install(InstallArgs),
    /// Uninstall an installed formula.
    Uninstall(UninstallArgs),
    /// Upgrade an installed formula to its latest known version.
    Upgrade(UpgradeArgs),
    /// List installed kegs.
    List(ListArgs),
    /// Show the install status of a formula.
    Status(StatusArgs),
}

impl Command {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        match self {
            Self::Init(_) => unreachable!("init is handled before Config::load in main"),
            Self::Install(cmd) => cmd.run(config, cache).await,
            Self::Uninstall(cmd) => cmd.run(config, cache).await,
            Self::Upgrade(cmd) => cmd.run(config, cache).await,
            Self::List(cmd) => cmd.run(config, cache).await,
            Self::Status(cmd) => cmd.run(config, cache).await,
        }
    }
}
