//! Upgrading an already-installed formula to a new version. This is the
//! same stash/restore/rebuild shape used for a dependency mid-recursion,
//! applied to a top-level target: unlink the currently
//! linked keg, stash its prefix, install the new formula at the fresh
//! version path, and roll the stash back if that install fails.

use kegforge_common::config::Config;
use kegforge_common::model::{Formula, Options};

use crate::context::InstallerContext;
use crate::error::Result;
use crate::installer::{Collaborators, InstallOutcome, Installer, ModeFlags};
use crate::rollback::DependencyStash;

/// Upgrades `formula` (already installed at some older version) to the
/// version carried in `formula` itself. Runs the full `prelude → install`
/// sequence for the new version inside the same stash/restore guard
/// `install_dependency` uses, so a failed upgrade leaves the prior
/// version linked and in place rather than half-installed.
pub async fn upgrade(
    config: &Config,
    ctx: &mut InstallerContext,
    formula: &Formula,
    flags: ModeFlags,
    requested_options: Options,
    collaborators: &Collaborators<'_>,
) -> Result<InstallOutcome> {
    let prefix = formula.prefix(config);
    let opt_dir = config.opt_dir();

    let stash = DependencyStash::create(&formula.full_name, &prefix, config.prefix(), &opt_dir)?;

    let mut installer = Installer::new(config, flags, requested_options);
    let result = run(&mut installer, ctx, formula, collaborators).await;

    match result {
        Ok(outcome) => {
            stash.commit()?;
            Ok(outcome)
        }
        Err(e) => {
            stash.rollback(config.prefix(), &opt_dir)?;
            Err(e)
        }
    }
}

async fn run(
    installer: &mut Installer<'_>,
    ctx: &mut InstallerContext,
    formula: &Formula,
    collaborators: &Collaborators<'_>,
) -> Result<InstallOutcome> {
    let plan = installer.prelude(ctx, formula, collaborators)?;
    if !installer.flags.ignore_deps {
        installer
            .install_dependencies(ctx, &plan, collaborators)
            .await?;
    }
    installer.install(ctx, formula, collaborators).await
}
