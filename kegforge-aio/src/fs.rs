// Primitive synchronous filesystem operations shared by the build driver,
// bottle pour, and finisher.
use std::fs::{self, File, Permissions};
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use kegforge_common::error::{KfError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

pub fn check_path_exists(path: &Path) -> bool {
    path.exists()
}

pub fn check_symlink_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

pub fn is_directory(path: &Path) -> bool {
    path.is_dir()
}

pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

pub fn get_metadata(path: &Path) -> Result<fs::Metadata> {
    fs::metadata(path).map_err(KfError::from)
}

pub fn get_symlink_metadata(path: &Path) -> Result<fs::Metadata> {
    fs::symlink_metadata(path).map_err(KfError::from)
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        KfError::from(e)
    })
}

pub fn remove_file(path: &Path) -> Result<()> {
    debug!("Removing file: {}", path.display());
    fs::remove_file(path).map_err(|e| {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Failed remove file {}: {}", path.display(), e);
        }
        KfError::from(e)
    })
}

pub fn remove_dir(path: &Path) -> Result<()> {
    debug!("Removing directory: {}", path.display());
    fs::remove_dir(path).map_err(|e| {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Failed remove dir {}: {}", path.display(), e);
        }
        KfError::from(e)
    })
}

pub fn remove_directory_recursive(path: &Path) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    fs::remove_dir_all(path).map_err(|e| {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Failed remove dir_all {}: {}", path.display(), e);
        }
        KfError::from(e)
    })
}

pub fn create_file(path: &Path) -> Result<File> {
    debug!("Creating file: {}", path.display());
    File::create(path).map_err(|e| {
        error!("Failed create file {}: {}", path.display(), e);
        KfError::from(e)
    })
}

pub fn open_file(path: &Path) -> Result<File> {
    debug!("Opening file: {}", path.display());
    File::open(path).map_err(|e| {
        error!("Failed open file {}: {}", path.display(), e);
        KfError::from(e)
    })
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        error!("Failed read file {}: {}", path.display(), e);
        KfError::from(e)
    })
}

pub fn read_to_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        error!("Failed read file {}: {}", path.display(), e);
        KfError::from(e)
    })
}

pub fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
) -> Result<u64> {
    io::copy(reader, writer).map_err(KfError::from)
}

#[cfg(unix)]
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    debug!(
        "Creating symlink {} -> {}",
        link.display(),
        target.display()
    );
    symlink(target, link).map_err(|e| {
        error!(
            "Failed create symlink {} -> {}: {}",
            link.display(),
            target.display(),
            e
        );
        KfError::from(e)
    })
}

#[cfg(not(unix))]
pub fn create_symlink(_target: &Path, link: &Path) -> Result<()> {
    warn!("Symlink creation not supported on this platform: {}", link.display());
    Err(KfError::Generic("symlinks not supported on this platform".to_string()))
}

#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|e| {
        error!("Failed set permissions on {}: {}", path.display(), e);
        KfError::from(e)
    })
}

#[cfg(not(unix))]
pub fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Atomically writes data to a file via a same-directory temp file and
/// rename, preserving original permissions when the file already existed.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        KfError::Generic(format!(
            "cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    create_dir_all(dir)?;

    let original_perms = fs::metadata(original_path).map(|m| m.permissions()).ok();

    let mut temp_file = NamedTempFile::new_in(dir).map_err(KfError::from)?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content).map_err(KfError::from)?;
    temp_file.flush().map_err(KfError::from)?;
    let _ = temp_file.as_file().sync_all();

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temp file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        KfError::from(e.error)
    })?;

    if let Some(perms) = original_perms {
        #[cfg(unix)]
        {
            if let Err(e) = fs::set_permissions(original_path, perms) {
                warn!(
                    "Failed to restore original permissions on {}: {}",
                    original_path.display(),
                    e
                );
            }
        }
    } else if cfg!(unix) {
        if let Err(e) = set_permissions(original_path, 0o644) {
            warn!(
                "Failed to set default permissions on new file {}: {}",
                original_path.display(),
                e
            );
        }
    }

    Ok(())
}

pub fn list_directory_entries(dir_path: &Path) -> Result<Vec<(String, PathBuf, bool)>> {
    let mut entries = Vec::new();
    match fs::read_dir(dir_path) {
        Ok(read_dir) => {
            for entry_res in read_dir {
                match entry_res {
                    Ok(entry) => {
                        let path = entry.path();
                        let name = entry.file_name().to_string_lossy().to_string();
                        match entry.file_type() {
                            Ok(file_type) => entries.push((name, path, file_type.is_dir())),
                            Err(e) => warn!(
                                "Failed to get file type for {}: {}",
                                path.display(),
                                e
                            ),
                        }
                    }
                    Err(e) => warn!("Error reading entry in {}: {}", dir_path.display(), e),
                }
            }
            Ok(entries)
        }
        Err(e) => {
            error!("Failed to read directory {}: {}", dir_path.display(), e);
            Err(KfError::from(e))
        }
    }
}
