//! Build driver. Builds run in a pristine-environment child process
//! (`kegforge_aio::spawn_pristine`) rather than a forked child, since the
//! only requirement is an isolated environment, not shared memory with
//! the parent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use kegforge_common::model::{BuildOptions, Formula, Options};

use crate::error::{InstallError, Result};
use crate::rollback::PrefixCleanupGuard;

/// The installer flags that feed into `sanitized_args`. A
/// narrower slice of the full installer mode set, only what the build
/// child's argv needs to reconstruct.
#[derive(Debug, Clone, Default)]
pub struct BuildFlags {
    pub ignore_deps: bool,
    pub build_bottle: bool,
    pub bottle_arch: Option<String>,
    pub git: bool,
    pub interactive: bool,
    pub verbose: bool,
    pub debug: bool,
    pub cc: Option<String>,
    pub env: Option<String>,
    pub head: bool,
    pub devel: bool,
    pub formula_env_is_std: bool,
    pub has_scons_dep: bool,
}

/// `sanitized_args`: a reproducible command-line reconstructed
/// from the installer's flags plus any `name=value` options the user
/// supplied.
pub fn sanitized_args(flags: &BuildFlags, user_options: &Options) -> Vec<String> {
    let mut args = Vec::new();
    if flags.ignore_deps {
        args.push("--ignore-dependencies".to_string());
    }
    if flags.build_bottle {
        args.push("--build-bottle".to_string());
        if let Some(arch) = &flags.bottle_arch {
            args.push(format!("--bottle-arch={arch}"));
        }
    }
    if flags.git {
        args.push("--git".to_string());
    }
    if flags.interactive {
        args.push("--interactive".to_string());
    }
    if flags.verbose {
        args.push("--verbose".to_string());
    }
    if flags.debug {
        args.push("--debug".to_string());
    }
    if let Some(cc) = &flags.cc {
        args.push(format!("--cc={cc}"));
    }
    let env = flags.env.clone().or_else(|| {
        (flags.formula_env_is_std || flags.has_scons_dep).then(|| "std".to_string())
    });
    if let Some(env) = env {
        args.push(format!("--env={env}"));
    }
    if flags.head {
        args.push("--HEAD".to_string());
    } else if flags.devel {
        args.push("--devel".to_string());
    }
    for opt in user_options.iter() {
        if let Some(value) = &opt.value {
            args.push(format!("{}={value}", opt.name));
        }
    }
    args
}

/// "option_flags": every bare boolean option the user
/// requested, as `--name` flags (distinct from the `name=value` pairs
/// `sanitized_args` already folds in).
pub fn option_flags(user_options: &Options) -> Vec<String> {
    user_options
        .iter()
        .filter(|opt| opt.value.is_none())
        .map(|opt| format!("--{}", opt.name))
        .collect()
}

/// Builds the full child argv: `nice <interpreter> -W0 -I <load_path> --
/// <build_script> <formula_path> <sanitized_args> <option_flags>`.
pub fn build_argv(
    interpreter: &str,
    load_path: &str,
    build_script: &str,
    formula_path: &Path,
    flags: &BuildFlags,
    user_options: &Options,
) -> Vec<String> {
    let mut argv = vec![
        "nice".to_string(),
        interpreter.to_string(),
        "-W0".to_string(),
        "-I".to_string(),
        load_path.to_string(),
        "--".to_string(),
        build_script.to_string(),
        formula_path.display().to_string(),
    ];
    argv.extend(sanitized_args(flags, user_options));
    argv.extend(option_flags(user_options));
    argv
}

/// run the build child, then verify the prefix is non-empty.
/// On any failure, remove the (possibly partial) prefix and the rack if
/// it's now empty, via [`PrefixCleanupGuard`], before propagating.
pub async fn run_build(
    formula: &Formula,
    formula_path: &Path,
    prefix: &Path,
    rack: &Path,
    cwd: &Path,
    interpreter: &str,
    load_path: &str,
    build_script: &str,
    flags: &BuildFlags,
    build: &BuildOptions,
    extra_env: &HashMap<String, String>,
) -> Result<()> {
    let argv = build_argv(
        interpreter,
        load_path,
        build_script,
        formula_path,
        flags,
        &build.args,
    );

    let guard = PrefixCleanupGuard::new(prefix, rack);

    let output = kegforge_aio::spawn_pristine(&argv, cwd, extra_env)
        .await
        .map_err(InstallError::from)?;

    if !output.status.success() {
        return Err(InstallError::BuildFailed {
            formula: formula.full_name.clone(),
            reason: format!(
                "build script exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    if !prefix_has_entries(prefix) {
        return Err(InstallError::BuildFailed {
            formula: formula.full_name.clone(),
            reason: "Empty installation".to_string(),
        });
    }

    guard.disarm();
    Ok(())
}

fn prefix_has_entries(prefix: &Path) -> bool {
    std::fs::read_dir(prefix)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// filesystem layout: the per-formula build log directory, used
/// by the sandbox profile (when sandboxing is available) to grant write
/// access alongside temp, cache, and the cellar location.
pub fn log_dir(formula_logs: &Path) -> PathBuf {
    formula_logs.to_path_buf()
}
