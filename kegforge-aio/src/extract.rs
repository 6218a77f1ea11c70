// Archive staging. Synchronous
// these are short-lived, CPU/IO-bound unpacks run from a
// blocking context (`spawn_blocking` at the call site in kegforge-core),
// not long-held async work, so there is no value in an async decoder stack.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use kegforge_common::error::{KfError, Result};
use tracing::{debug, warn};
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Extracts `archive_path` into `target_dir`, stripping `strip_components`
/// leading path segments from every entry (bottles are typically tarred
/// with a single top-level `<formula>/<version>/` directory that gets
/// stripped so its contents land directly in the keg). Archive type is
/// inferred from the file extension.
pub fn stage(archive_path: &Path, target_dir: &Path, strip_components: usize) -> Result<()> {
    let kind = archive_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    debug!(
        "staging {} (type {kind}) into {}",
        archive_path.display(),
        target_dir.display()
    );
    fs::create_dir_all(target_dir)?;

    match kind.as_str() {
        "zip" => stage_zip(archive_path, target_dir, strip_components),
        "gz" | "tgz" => stage_tar(
            GzDecoder::new(File::open(archive_path)?),
            target_dir,
            strip_components,
        ),
        "bz2" | "tbz" | "tbz2" => stage_tar(
            BzDecoder::new(File::open(archive_path)?),
            target_dir,
            strip_components,
        ),
        "xz" | "txz" => stage_tar(
            XzDecoder::new(File::open(archive_path)?),
            target_dir,
            strip_components,
        ),
        "tar" => stage_tar(File::open(archive_path)?, target_dir, strip_components),
        other => Err(KfError::Generic(format!(
            "unsupported archive type for staging: '{other}'"
        ))),
    }
}

fn stage_tar<R: Read>(reader: R, target_dir: &Path, strip_components: usize) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let original_path = entry.path()?.into_owned();
        let Some(target_path) = stripped_target(&original_path, target_dir, strip_components)
        else {
            continue;
        };
        entry.unpack(&target_path)?;
    }
    Ok(())
}

fn stage_zip(archive_path: &Path, target_dir: &Path, strip_components: usize) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| KfError::Generic(format!("invalid zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| KfError::Generic(format!("failed to read zip entry {i}: {e}")))?;
        let Some(name) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("skipping zip entry with unsafe name");
            continue;
        };
        let Some(target_path) = stripped_target(&name, target_dir, strip_components) else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target_path)?;
        } else {
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target_path)?;
            std::io::copy(&mut entry, &mut out)?;
            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                crate::fs::set_permissions(&target_path, mode)?;
            }
        }
    }
    Ok(())
}

/// Strips `strip_components` leading segments and rejects path traversal.
/// Returns `None` for entries that are wholly consumed by stripping (e.g.
/// the top-level directory entry itself).
fn stripped_target(
    original: &Path,
    target_dir: &Path,
    strip_components: usize,
) -> Option<PathBuf> {
    let stripped: Vec<_> = original.components().skip(strip_components).collect();
    if stripped.is_empty() {
        return None;
    }
    let mut target_path = target_dir.to_path_buf();
    for comp in stripped {
        match comp {
            Component::Normal(p) => target_path.push(p),
            Component::CurDir => {}
            _ => {
                warn!("rejecting unsafe path component in archive entry: {original:?}");
                return None;
            }
        }
    }
    if !target_path.starts_with(target_dir) {
        warn!("rejecting path traversal in archive entry: {original:?}");
        return None;
    }
    Some(target_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("thing.rar");
        std::fs::write(&archive, b"x").unwrap();
        let out = dir.path().join("out");
        assert!(stage(&archive, &out, 0).is_err());
    }

    #[test]
    fn strips_leading_components() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("a.tar");
        let file = File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);
        let data = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "formula-1.0/bin/tool", &data[..])
            .unwrap();
        builder.finish().unwrap();

        let target = dir.path().join("out");
        stage(&archive_path, &target, 1).unwrap();
        assert!(target.join("bin/tool").is_file());
    }
}
