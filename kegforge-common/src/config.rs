use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

const DEFAULT_LINUX_PREFIX: &str = "/home/linuxbrew/.linuxbrew";
const DEFAULT_MACOS_INTEL_PREFIX: &str = "/usr/local";
const DEFAULT_MACOS_ARM_PREFIX: &str = "/opt/homebrew";

/// Checks `KEGFORGE_PREFIX`/`HOMEBREW_PREFIX` env vars, then falls back to
/// the OS-specific default tree.
fn determine_prefix() -> PathBuf {
    if let Ok(prefix) = env::var("KEGFORGE_PREFIX").or_else(|_| env::var("HOMEBREW_PREFIX")) {
        debug!("Using prefix from environment variable: {}", prefix);
        return PathBuf::from(prefix);
    }

    let default_prefix = if cfg!(target_os = "linux") {
        DEFAULT_LINUX_PREFIX
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            DEFAULT_MACOS_ARM_PREFIX
        } else {
            DEFAULT_MACOS_INTEL_PREFIX
        }
    } else {
        "/usr/local/kegforge"
    };
    debug!("Using default prefix for OS/Arch: {}", default_prefix);
    PathBuf::from(default_prefix)
}

fn determine_cache_dir() -> PathBuf {
    if let Ok(dir) = env::var("KEGFORGE_CACHE") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("kegforge")
}

/// Paths and environment-derived settings threaded through every component
/// of the installer. A plain struct with explicit accessors rather than
/// metaprogrammed ones, per the Design Notes.
#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf,
    pub cellar: PathBuf,
    pub taps_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub no_emoji: bool,
    pub install_badge: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading kegforge configuration");
        let prefix = determine_prefix();
        let cellar = env::var("KEGFORGE_CELLAR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| prefix.join("Cellar"));
        let taps_dir = prefix.join("Library/Taps");
        let cache_dir = determine_cache_dir();
        let no_emoji = env::var("KEGFORGE_NO_EMOJI").is_ok();
        let install_badge = env::var("KEGFORGE_INSTALL_BADGE").ok();

        debug!("Configuration loaded successfully.");
        Ok(Self {
            prefix,
            cellar,
            taps_dir,
            cache_dir,
            no_emoji,
            install_badge,
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn cellar_path(&self) -> &Path {
        &self.cellar
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn opt_dir(&self) -> PathBuf {
        self.prefix.join("opt")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.prefix.join("Logs")
    }

    /// `<formula>.rack`, the parent directory of all of a formula's kegs.
    pub fn formula_rack_dir(&self, formula_name: &str) -> PathBuf {
        self.cellar_path().join(formula_name)
    }

    /// `<formula>.prefix`, one specific keg.
    pub fn formula_keg_path(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_rack_dir(formula_name).join(version_str)
    }

    /// `<formula>.opt_prefix`, the stable symlink alias for the active keg.
    pub fn formula_opt_link_path(&self, formula_name: &str) -> PathBuf {
        self.opt_dir().join(formula_name)
    }

    /// `<formula>.logs`.
    pub fn formula_logs_dir(&self, formula_name: &str) -> PathBuf {
        self.logs_dir().join(formula_name)
    }

    pub fn get_tap_path(&self, name: &str) -> Option<PathBuf> {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() == 2 {
            Some(
                self.taps_dir
                    .join(parts[0])
                    .join(format!("homebrew-{}", parts[1])),
            )
        } else {
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load().expect("failed to load default configuration")
    }
}
