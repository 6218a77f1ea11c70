// Primitive filesystem removal used by the build driver's failure cleanup
// and by formula uninstall. Casks, `pkgutil`, and `launchd` bookkeeping
// are out of scope for a formula installer core.

use std::io;
use std::path::Path;
use std::process::Command;

use kegforge_common::error::{KfError, Result};
use tracing::{debug, error, warn};

use crate::fs as kf_fs;

/// Removes a filesystem path (file, symlink, or directory recursively).
/// Falls back to `sudo rm -rf` on `PermissionDenied` when `use_sudo` is
/// set; a missing path is treated as already-removed success.
pub fn remove_path(path: &Path, use_sudo: bool) -> Result<()> {
    let metadata = match kf_fs::get_symlink_metadata(path) {
        Ok(m) => m,
        Err(KfError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            debug!("path already removed: {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let remove_result = if metadata.file_type().is_dir() {
        kf_fs::remove_directory_recursive(path)
    } else {
        kf_fs::remove_file(path)
    };

    match remove_result {
        Ok(()) => Ok(()),
        Err(KfError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(KfError::Io(e)) if use_sudo && e.kind() == io::ErrorKind::PermissionDenied => {
            warn!(
                "direct removal of {} denied, retrying with sudo rm -rf",
                path.display()
            );
            let output = Command::new("sudo").arg("rm").arg("-rf").arg(path).output()?;
            if output.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                error!("sudo rm -rf {} failed: {stderr}", path.display());
                Err(KfError::CommandExecError(format!(
                    "sudo rm -rf failed for {}: {stderr}",
                    path.display()
                )))
            }
        }
        Err(e) => Err(e),
    }
}
