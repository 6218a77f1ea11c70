use std::collections::HashMap;
use std::process::Output as StdOutput;
use std::process::Stdio;

use kegforge_common::error::{KfError, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// Runs `argv[0]` with `argv[1..]` in a pristine environment: every
/// inherited variable is cleared except `PATH` and `HOME`, then `envs` is
/// applied on top. `spawn`-with-explicit-envp gives each build a clean
/// environment without needing a fork-and-exec dance to isolate it.
pub async fn spawn_pristine(
    argv: &[String],
    cwd: &std::path::Path,
    envs: &HashMap<String, String>,
) -> Result<StdOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| KfError::Generic("empty argv passed to spawn_pristine".to_string()))?;

    debug!(
        "spawning pristine child: {program} {args:?} (cwd: {})",
        cwd.display()
    );

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(cwd);
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
        cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
        cmd.env("HOME", home);
    }
    cmd.envs(envs);
    cmd.kill_on_drop(true);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    cmd.output().await.map_err(|e| {
        error!("failed to spawn pristine child {program}: {e}");
        KfError::from(e)
    })
}
